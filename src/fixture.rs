//! Synthetic class files for unit tests.

use std::collections::HashMap;

pub const VISIBLE: &str = "RuntimeVisibleAnnotations";
pub const INVISIBLE: &str = "RuntimeInvisibleAnnotations";

pub enum Value {
    Int(i32),
    Str(&'static str),
    Enum(&'static str, &'static str),
    Class(&'static str),
    Annotation(&'static str, Vec<(&'static str, Value)>),
    Array(Vec<Value>),
}

#[derive(Default)]
pub struct ClassFileBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    this_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    /// `name` in internal form, e.g. `com/example/Foo`.
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            next_index: 1,
            ..Self::default()
        };
        builder.this_class = builder.class(name);
        builder
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8.get(text) {
            return *index;
        }
        let index = self.next_index;
        self.pool.push(1);
        self.pool.extend_from_slice(&(text.len() as u16).to_be_bytes());
        self.pool.extend_from_slice(text.as_bytes());
        self.next_index += 1;
        self.utf8.insert(text.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.indirect(7, name_index)
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let text_index = self.utf8(text);
        self.indirect(8, text_index)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let index = self.next_index;
        self.pool.push(5);
        self.pool.extend_from_slice(&value.to_be_bytes());
        self.next_index += 2;
        index
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let index = self.next_index;
        self.pool.push(3);
        self.pool.extend_from_slice(&value.to_be_bytes());
        self.next_index += 1;
        index
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    fn indirect(&mut self, tag: u8, target: u16) -> u16 {
        let index = self.next_index;
        self.pool.push(tag);
        self.pool.extend_from_slice(&target.to_be_bytes());
        self.next_index += 1;
        index
    }

    /// One `annotation` structure; `type_name` in dotted form.
    pub fn annotation(&mut self, type_name: &str, elements: Vec<(&'static str, Value)>) -> Vec<u8> {
        let descriptor = format!("L{};", type_name.replace('.', "/"));
        let mut out = self.utf8(&descriptor).to_be_bytes().to_vec();
        out.extend_from_slice(&(elements.len() as u16).to_be_bytes());
        for (name, value) in elements {
            out.extend_from_slice(&self.utf8(name).to_be_bytes());
            out.extend(self.element(value));
        }
        out
    }

    fn element(&mut self, value: Value) -> Vec<u8> {
        match value {
            Value::Int(v) => {
                let mut out = vec![b'I'];
                out.extend_from_slice(&self.integer(v).to_be_bytes());
                out
            }
            Value::Str(s) => {
                let mut out = vec![b's'];
                out.extend_from_slice(&self.utf8(s).to_be_bytes());
                out
            }
            Value::Enum(type_name, constant) => {
                let mut out = vec![b'e'];
                out.extend_from_slice(&self.utf8(type_name).to_be_bytes());
                out.extend_from_slice(&self.utf8(constant).to_be_bytes());
                out
            }
            Value::Class(descriptor) => {
                let mut out = vec![b'c'];
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
                out
            }
            Value::Annotation(type_name, elements) => {
                let mut out = vec![b'@'];
                out.extend(self.annotation(type_name, elements));
                out
            }
            Value::Array(values) => {
                let mut out = vec![b'['];
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                for v in values {
                    out.extend(self.element(v));
                }
                out
            }
        }
    }

    /// A complete attribute (name index, u4 length, body).
    pub fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        let mut out = self.utf8(name).to_be_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    pub fn annotations_attribute(&mut self, name: &str, annotations: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = (annotations.len() as u16).to_be_bytes().to_vec();
        for a in annotations {
            body.extend(a);
        }
        self.attribute(name, &body)
    }

    pub fn field(&mut self, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let member = self.member(name, descriptor, attributes);
        self.fields.extend(member);
        self.field_count += 1;
        self
    }

    pub fn method(&mut self, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let member = self.member(name, descriptor, attributes);
        self.methods.extend(member);
        self.method_count += 1;
        self
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    fn member(&mut self, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = 0x0001u16.to_be_bytes().to_vec();
        out.extend_from_slice(&self.utf8(name).to_be_bytes());
        out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for a in attributes {
            out.extend(a);
        }
        out
    }

    pub fn build(&mut self) -> Vec<u8> {
        let super_class = self.class("java/lang/Object");
        let mut out = 0xCAFEBABEu32.to_be_bytes().to_vec();
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&self.next_index.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        out.extend_from_slice(&self.field_count.to_be_bytes());
        out.extend_from_slice(&self.fields);
        out.extend_from_slice(&self.method_count.to_be_bytes());
        out.extend_from_slice(&self.methods);
        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for a in &self.attributes {
            out.extend_from_slice(a);
        }
        out
    }
}

/// A class carrying the given type-level annotations (dotted names), each
/// with one scalar element, behind a `SourceFile` attribute.
pub fn annotated_class(name: &str, annotations: &[&str]) -> Vec<u8> {
    let mut builder = ClassFileBuilder::new(name);
    let source_file = builder.utf8("Foo.java");
    let source_attr = builder.attribute("SourceFile", &source_file.to_be_bytes());
    builder.class_attribute(source_attr);
    let records: Vec<Vec<u8>> = annotations
        .iter()
        .map(|a| builder.annotation(a, vec![("value", Value::Str("x"))]))
        .collect();
    let attr = builder.annotations_attribute(VISIBLE, records);
    builder.class_attribute(attr);
    builder.build()
}
