//! Observer side of detection: which annotations are interesting and who
//! gets told about them.
//!
//! A [`Reporter`] bundles up to three capabilities (type, field and method
//! level). Each capability owns its own [`InterestSet`], mapping annotation
//! descriptors such as `Lcom/example/Plugin;` to a caller-chosen handle that
//! is passed back on every report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Type,
    Field,
    Method,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Type => "type",
            Level::Field => "field",
            Level::Method => "method",
        }
    }
}

/// Field descriptor of an annotation type: `a.b.C` and `a/b/C` both become `La/b/C;`.
pub fn descriptor_for(annotation: &str) -> String {
    format!("L{};", annotation.replace('.', "/"))
}

#[derive(Debug, Clone)]
pub struct InterestSet<H> {
    by_descriptor: HashMap<String, H>,
}

impl<H> Default for InterestSet<H> {
    fn default() -> Self {
        Self {
            by_descriptor: HashMap::new(),
        }
    }
}

impl<H> InterestSet<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, annotation: &str, handle: H) {
        self.by_descriptor.insert(descriptor_for(annotation), handle);
    }

    pub fn with(mut self, annotation: &str, handle: H) -> Self {
        self.insert(annotation, handle);
        self
    }

    pub fn get(&self, descriptor: &str) -> Option<&H> {
        self.by_descriptor.get(descriptor)
    }

    pub fn len(&self) -> usize {
        self.by_descriptor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_descriptor.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &str> {
        self.by_descriptor.keys().map(String::as_str)
    }
}

impl InterestSet<String> {
    /// Interest set whose handles are the dotted annotation names themselves.
    pub fn of_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| {
                let name = n.as_ref().replace('/', ".");
                (name.clone(), name)
            })
            .collect()
    }
}

impl<S: AsRef<str>, H> FromIterator<(S, H)> for InterestSet<H> {
    fn from_iter<T: IntoIterator<Item = (S, H)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (name, handle) in iter {
            set.insert(name.as_ref(), handle);
        }
        set
    }
}

pub type TypeCallback<'a, H> = Box<dyn FnMut(&H, &str) + 'a>;
pub type MemberCallback<'a, H> = Box<dyn FnMut(&H, &str, &str) + 'a>;

pub(crate) struct Capability<H, F> {
    pub(crate) interests: InterestSet<H>,
    pub(crate) callback: F,
}

/// The capabilities a caller registers before scanning.
///
/// ```
/// use adetect::reporter::{InterestSet, Reporter};
///
/// let mut found = Vec::new();
/// let reporter = Reporter::new().on_type(
///     InterestSet::of_names(["com.example.Plugin"]),
///     |annotation: &String, class_name: &str| found.push((annotation.clone(), class_name.to_string())),
/// );
/// assert!(reporter.reports_types());
/// ```
pub struct Reporter<'a, H> {
    pub(crate) types: Option<Capability<H, TypeCallback<'a, H>>>,
    pub(crate) fields: Option<Capability<H, MemberCallback<'a, H>>>,
    pub(crate) methods: Option<Capability<H, MemberCallback<'a, H>>>,
}

impl<H> Default for Reporter<'_, H> {
    fn default() -> Self {
        Self {
            types: None,
            fields: None,
            methods: None,
        }
    }
}

impl<'a, H> Reporter<'a, H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_type(
        mut self,
        interests: InterestSet<H>,
        callback: impl FnMut(&H, &str) + 'a,
    ) -> Self {
        self.types = Some(Capability {
            interests,
            callback: Box::new(callback),
        });
        self
    }

    pub fn on_field(
        mut self,
        interests: InterestSet<H>,
        callback: impl FnMut(&H, &str, &str) + 'a,
    ) -> Self {
        self.fields = Some(Capability {
            interests,
            callback: Box::new(callback),
        });
        self
    }

    pub fn on_method(
        mut self,
        interests: InterestSet<H>,
        callback: impl FnMut(&H, &str, &str) + 'a,
    ) -> Self {
        self.methods = Some(Capability {
            interests,
            callback: Box::new(callback),
        });
        self
    }

    pub fn reports_types(&self) -> bool {
        self.types.is_some()
    }

    pub fn reports_fields(&self) -> bool {
        self.fields.is_some()
    }

    pub fn reports_methods(&self) -> bool {
        self.methods.is_some()
    }

    pub fn reports(&self, level: Level) -> bool {
        match level {
            Level::Type => self.reports_types(),
            Level::Field => self.reports_fields(),
            Level::Method => self.reports_methods(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.reports_types() || self.reports_fields() || self.reports_methods())
    }

    /// Invokes the callback for `level` when `descriptor` is in its interest set.
    /// Returns whether a report was made.
    pub(crate) fn report(
        &mut self,
        level: Level,
        descriptor: &str,
        class_name: &str,
        member_name: &str,
    ) -> bool {
        match level {
            Level::Type => match self.types.as_mut() {
                Some(Capability { interests, callback }) => match interests.get(descriptor) {
                    Some(handle) => {
                        callback(handle, class_name);
                        true
                    }
                    None => false,
                },
                None => false,
            },
            Level::Field => report_member(self.fields.as_mut(), descriptor, class_name, member_name),
            Level::Method => {
                report_member(self.methods.as_mut(), descriptor, class_name, member_name)
            }
        }
    }
}

fn report_member<H>(
    capability: Option<&mut Capability<H, MemberCallback<'_, H>>>,
    descriptor: &str,
    class_name: &str,
    member_name: &str,
) -> bool {
    let Some(Capability { interests, callback }) = capability else {
        return false;
    };
    let Some(handle) = interests.get(descriptor) else {
        return false;
    };
    callback(handle, class_name, member_name);
    true
}
