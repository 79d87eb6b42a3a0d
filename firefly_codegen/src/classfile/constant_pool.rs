//! The constant pool: a dedup'd, 1-indexed table of UTF-8 strings, class
//! references, name-and-type pairs, and member refs. Every other writer in
//! `classfile` goes through here to turn a name/descriptor into the `u16`
//! index the bytecode actually encodes.

use std::collections::HashMap;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

pub type ConstantPoolRef = u16;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_INVOKE_DYNAMIC: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Entry {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Double(u64),
    Class(ConstantPoolRef),
    String(ConstantPoolRef),
    NameAndType(ConstantPoolRef, ConstantPoolRef),
    Fieldref(ConstantPoolRef, ConstantPoolRef),
    Methodref(ConstantPoolRef, ConstantPoolRef),
    InterfaceMethodref(ConstantPoolRef, ConstantPoolRef),
    MethodHandle(u8, ConstantPoolRef),
    MethodType(ConstantPoolRef),
    InvokeDynamic(u16, ConstantPoolRef),
}

/// A reference kind for `CONSTANT_MethodHandle`, per JVM spec table 4.4.8-A.
/// Only the two kinds the lambda lowerer needs are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodHandleKind {
    InvokeStatic = 6,
    InvokeSpecial = 7,
}

#[derive(Default)]
pub struct ConstantPool {
    entries: Vec<Entry>,
    index: HashMap<Entry, ConstantPoolRef>,
    /// Bootstrap methods accumulated for `invokedynamic` call sites; written
    /// out by the class writer as a `BootstrapMethods` attribute.
    bootstrap_methods: Vec<BootstrapMethod>,
}

pub struct BootstrapMethod {
    pub method_handle: ConstantPoolRef,
    pub arguments: Vec<ConstantPoolRef>,
}

impl ConstantPool {
    fn intern(&mut self, entry: Entry) -> ConstantPoolRef {
        if let Some(&idx) = self.index.get(&entry) {
            return idx;
        }
        self.entries.push(entry.clone());
        // The constant pool is 1-indexed and entry 0 is reserved.
        let idx = self.entries.len() as ConstantPoolRef;
        self.index.insert(entry, idx);
        idx
    }

    pub fn utf8(&mut self, value: impl Into<String>) -> ConstantPoolRef {
        self.intern(Entry::Utf8(value.into()))
    }

    pub fn integer(&mut self, value: i32) -> ConstantPoolRef {
        self.intern(Entry::Integer(value))
    }

    pub fn long(&mut self, value: i64) -> ConstantPoolRef {
        self.intern(Entry::Long(value))
    }

    pub fn double(&mut self, value: f64) -> ConstantPoolRef {
        self.intern(Entry::Double(value.to_bits()))
    }

    pub fn class(&mut self, internal_name: impl Into<String>) -> ConstantPoolRef {
        let name_ref = self.utf8(internal_name);
        self.intern(Entry::Class(name_ref))
    }

    pub fn string(&mut self, value: impl Into<String>) -> ConstantPoolRef {
        let utf8_ref = self.utf8(value);
        self.intern(Entry::String(utf8_ref))
    }

    pub fn name_and_type(&mut self, name: impl Into<String>, descriptor: impl Into<String>) -> ConstantPoolRef {
        let name_ref = self.utf8(name);
        let desc_ref = self.utf8(descriptor);
        self.intern(Entry::NameAndType(name_ref, desc_ref))
    }

    pub fn fieldref(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> ConstantPoolRef {
        let class_ref = self.class(owner);
        let nt_ref = self.name_and_type(name, descriptor);
        self.intern(Entry::Fieldref(class_ref, nt_ref))
    }

    pub fn methodref(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> ConstantPoolRef {
        let class_ref = self.class(owner);
        let nt_ref = self.name_and_type(name, descriptor);
        self.intern(Entry::Methodref(class_ref, nt_ref))
    }

    pub fn interface_methodref(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> ConstantPoolRef {
        let class_ref = self.class(owner);
        let nt_ref = self.name_and_type(name, descriptor);
        self.intern(Entry::InterfaceMethodref(class_ref, nt_ref))
    }

    pub fn method_handle(
        &mut self,
        kind: MethodHandleKind,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> ConstantPoolRef {
        let method_ref = self.methodref(owner, name, descriptor);
        self.intern(Entry::MethodHandle(kind as u8, method_ref))
    }

    pub fn method_type(&mut self, descriptor: impl Into<String>) -> ConstantPoolRef {
        let desc_ref = self.utf8(descriptor);
        self.intern(Entry::MethodType(desc_ref))
    }

    /// Register a bootstrap method (e.g. `LambdaMetafactory.metafactory`)
    /// and emit an `invokedynamic` constant pool entry pointing at it.
    pub fn invoke_dynamic(
        &mut self,
        method_handle: ConstantPoolRef,
        bootstrap_args: Vec<ConstantPoolRef>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> ConstantPoolRef {
        let bootstrap_index = self.bootstrap_methods.len() as u16;
        self.bootstrap_methods.push(BootstrapMethod {
            method_handle,
            arguments: bootstrap_args,
        });
        let nt_ref = self.name_and_type(name, descriptor);
        self.intern(Entry::InvokeDynamic(bootstrap_index, nt_ref))
    }

    pub fn has_bootstrap_methods(&self) -> bool {
        !self.bootstrap_methods.is_empty()
    }

    pub fn write_bootstrap_methods_attribute(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_u16::<BigEndian>(self.bootstrap_methods.len() as u16)?;
        for bsm in &self.bootstrap_methods {
            out.write_u16::<BigEndian>(bsm.method_handle)?;
            out.write_u16::<BigEndian>(bsm.arguments.len() as u16)?;
            for arg in &bsm.arguments {
                out.write_u16::<BigEndian>(*arg)?;
            }
        }
        Ok(())
    }

    /// Number of constant pool entries, matching `constant_pool_count` in
    /// the class file header (count is entry count + 1 for the reserved slot).
    pub fn count(&self) -> u16 {
        self.entries.len() as u16 + 1
    }

    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_u16::<BigEndian>(self.count())?;
        for entry in &self.entries {
            match entry {
                Entry::Utf8(s) => {
                    out.write_u8(TAG_UTF8)?;
                    let bytes = s.as_bytes();
                    out.write_u16::<BigEndian>(bytes.len() as u16)?;
                    out.write_all(bytes)?;
                }
                Entry::Integer(v) => {
                    out.write_u8(TAG_INTEGER)?;
                    out.write_i32::<BigEndian>(*v)?;
                }
                Entry::Long(v) => {
                    out.write_u8(TAG_LONG)?;
                    out.write_i64::<BigEndian>(*v)?;
                }
                Entry::Double(bits) => {
                    out.write_u8(TAG_DOUBLE)?;
                    out.write_u64::<BigEndian>(*bits)?;
                }
                Entry::Class(name_ref) => {
                    out.write_u8(TAG_CLASS)?;
                    out.write_u16::<BigEndian>(*name_ref)?;
                }
                Entry::String(utf8_ref) => {
                    out.write_u8(TAG_STRING)?;
                    out.write_u16::<BigEndian>(*utf8_ref)?;
                }
                Entry::NameAndType(name_ref, desc_ref) => {
                    out.write_u8(TAG_NAME_AND_TYPE)?;
                    out.write_u16::<BigEndian>(*name_ref)?;
                    out.write_u16::<BigEndian>(*desc_ref)?;
                }
                Entry::Fieldref(class_ref, nt_ref) => {
                    out.write_u8(TAG_FIELDREF)?;
                    out.write_u16::<BigEndian>(*class_ref)?;
                    out.write_u16::<BigEndian>(*nt_ref)?;
                }
                Entry::Methodref(class_ref, nt_ref) => {
                    out.write_u8(TAG_METHODREF)?;
                    out.write_u16::<BigEndian>(*class_ref)?;
                    out.write_u16::<BigEndian>(*nt_ref)?;
                }
                Entry::InterfaceMethodref(class_ref, nt_ref) => {
                    out.write_u8(TAG_INTERFACE_METHODREF)?;
                    out.write_u16::<BigEndian>(*class_ref)?;
                    out.write_u16::<BigEndian>(*nt_ref)?;
                }
                Entry::MethodHandle(kind, method_ref) => {
                    out.write_u8(TAG_METHOD_HANDLE)?;
                    out.write_u8(*kind)?;
                    out.write_u16::<BigEndian>(*method_ref)?;
                }
                Entry::MethodType(desc_ref) => {
                    out.write_u8(TAG_METHOD_TYPE)?;
                    out.write_u16::<BigEndian>(*desc_ref)?;
                }
                Entry::InvokeDynamic(bootstrap_index, nt_ref) => {
                    out.write_u8(TAG_INVOKE_DYNAMIC)?;
                    out.write_u16::<BigEndian>(*bootstrap_index)?;
                    out.write_u16::<BigEndian>(*nt_ref)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utf8_entries_dedup() {
        let mut pool = ConstantPool::default();
        let a = pool.utf8("Code");
        let b = pool.utf8("Code");
        assert_eq!(a, b);
    }

    #[test]
    fn methodref_shares_class_entry_with_fieldref() {
        let mut pool = ConstantPool::default();
        let class_a = pool.class("java/lang/String");
        let _ = pool.methodref("java/lang/String", "valueOf", "(I)Ljava/lang/String;");
        let class_b = pool.class("java/lang/String");
        assert_eq!(class_a, class_b);
    }

    #[test]
    fn pool_count_includes_reserved_zero_slot() {
        let mut pool = ConstantPool::default();
        assert_eq!(pool.count(), 1);
        pool.utf8("x");
        assert_eq!(pool.count(), 2);
    }
}
