//! Test-only minimal class file reader. Parses just enough structure back
//! out of the emitter's own bytes — magic number, constant pool shape,
//! method table, `Code`/`StackMapTable` attribute presence — for the test
//! suite to assert invariants from spec §8 without shelling out to a real
//! JVM's verifier.

use std::collections::HashMap;

pub struct ParsedClass {
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: String,
    pub methods: Vec<ParsedMethod>,
    pub fields: Vec<ParsedField>,
    pool: HashMap<u16, CpEntry>,
}

/// A resolved `Fieldref`/`Methodref`/`InterfaceMethodref` constant: the
/// owner's internal name, the member's name, and its descriptor.
#[derive(Debug, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

pub struct ParsedField {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

pub struct ParsedMethod {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Option<ParsedCode>,
}

pub struct ParsedCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    pub has_stack_map_table: bool,
    pub line_number_count: usize,
    pub exception_table_len: usize,
}

enum CpEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    /// Fieldref/Methodref/InterfaceMethodref: (class_index, name_and_type_index).
    Ref(u16, u16),
    Other,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> u8 {
        let v = self.data[self.pos];
        self.pos += 1;
        v
    }
    fn u16(&mut self) -> u16 {
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        v
    }
    fn u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        v
    }
    fn bytes(&mut self, n: usize) -> &'a [u8] {
        let v = &self.data[self.pos..self.pos + n];
        self.pos += n;
        v
    }
    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

pub fn parse(data: &[u8]) -> ParsedClass {
    let mut c = Cursor { data, pos: 0 };
    let magic = c.u32();
    assert_eq!(magic, 0xCAFE_BABE, "bad magic number");
    let _minor = c.u16();
    let major_version = c.u16();

    let cp_count = c.u16();
    let mut pool: HashMap<u16, CpEntry> = HashMap::new();
    let mut idx = 1u16;
    while idx < cp_count {
        let tag = c.u8();
        match tag {
            1 => {
                let len = c.u16() as usize;
                let bytes = c.bytes(len).to_vec();
                pool.insert(idx, CpEntry::Utf8(String::from_utf8(bytes).unwrap()));
            }
            3 | 4 => {
                c.skip(4);
                pool.insert(idx, CpEntry::Other);
            }
            5 | 6 => {
                c.skip(8);
                pool.insert(idx, CpEntry::Other);
                // long/double occupy two constant pool slots.
                idx += 1;
                pool.insert(idx, CpEntry::Other);
            }
            7 => {
                let name_ref = c.u16();
                pool.insert(idx, CpEntry::Class(name_ref));
            }
            8 => {
                c.skip(2);
                pool.insert(idx, CpEntry::Other);
            }
            9 | 10 | 11 => {
                let class_idx = c.u16();
                let nat_idx = c.u16();
                pool.insert(idx, CpEntry::Ref(class_idx, nat_idx));
            }
            12 => {
                let n = c.u16();
                let t = c.u16();
                pool.insert(idx, CpEntry::NameAndType(n, t));
            }
            15 => {
                c.skip(3);
                pool.insert(idx, CpEntry::Other);
            }
            16 => {
                c.skip(2);
                pool.insert(idx, CpEntry::Other);
            }
            18 => {
                c.skip(4);
                pool.insert(idx, CpEntry::Other);
            }
            other => panic!("unknown constant pool tag {other}"),
        }
        idx += 1;
    }

    let utf8 = |r: u16, pool: &HashMap<u16, CpEntry>| -> String {
        match pool.get(&r) {
            Some(CpEntry::Utf8(s)) => s.clone(),
            _ => panic!("expected utf8 at {r}"),
        }
    };
    let class_name = |r: u16, pool: &HashMap<u16, CpEntry>| -> String {
        match pool.get(&r) {
            Some(CpEntry::Class(name_ref)) => utf8(*name_ref, pool),
            _ => panic!("expected class at {r}"),
        }
    };

    let access_flags = c.u16();
    let this_ref = c.u16();
    let super_ref = c.u16();
    let this_class = class_name(this_ref, &pool);
    let super_class = class_name(super_ref, &pool);

    let interfaces_count = c.u16();
    for _ in 0..interfaces_count {
        c.skip(2);
    }

    let fields_count = c.u16();
    let mut fields = Vec::new();
    for _ in 0..fields_count {
        let f_access = c.u16();
        let name_ref = c.u16();
        let desc_ref = c.u16();
        let attr_count = c.u16();
        for _ in 0..attr_count {
            c.skip(2);
            let len = c.u32();
            c.skip(len as usize);
        }
        fields.push(ParsedField {
            access_flags: f_access,
            name: utf8(name_ref, &pool),
            descriptor: utf8(desc_ref, &pool),
        });
    }

    let methods_count = c.u16();
    let mut methods = Vec::new();
    for _ in 0..methods_count {
        let m_access = c.u16();
        let name_ref = c.u16();
        let desc_ref = c.u16();
        let attr_count = c.u16();
        let mut code = None;
        for _ in 0..attr_count {
            let attr_name_ref = c.u16();
            let attr_len = c.u32();
            let attr_name = utf8(attr_name_ref, &pool);
            if attr_name == "Code" {
                let max_stack = c.u16();
                let max_locals = c.u16();
                let code_len = c.u32();
                let bytes = c.bytes(code_len as usize).to_vec();
                let exc_count = c.u16();
                for _ in 0..exc_count {
                    c.skip(8);
                }
                let code_attr_count = c.u16();
                let mut has_smt = false;
                let mut line_count = 0;
                for _ in 0..code_attr_count {
                    let sub_name_ref = c.u16();
                    let sub_len = c.u32();
                    let sub_name = utf8(sub_name_ref, &pool);
                    if sub_name == "StackMapTable" {
                        has_smt = true;
                        c.skip(sub_len as usize);
                    } else if sub_name == "LineNumberTable" {
                        let n = c.u16();
                        line_count = n as usize;
                        c.skip(sub_len as usize - 2);
                    } else {
                        c.skip(sub_len as usize);
                    }
                }
                code = Some(ParsedCode {
                    max_stack,
                    max_locals,
                    bytes,
                    has_stack_map_table: has_smt,
                    line_number_count: line_count,
                    exception_table_len: exc_count as usize,
                });
            } else {
                c.skip(attr_len as usize);
            }
        }
        methods.push(ParsedMethod {
            access_flags: m_access,
            name: utf8(name_ref, &pool),
            descriptor: utf8(desc_ref, &pool),
            code,
        });
    }

    ParsedClass {
        major_version,
        access_flags,
        this_class,
        super_class,
        methods,
        fields,
        pool,
    }
}

impl ParsedClass {
    pub fn method(&self, name: &str) -> Option<&ParsedMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    fn utf8(&self, index: u16) -> String {
        match self.pool.get(&index) {
            Some(CpEntry::Utf8(s)) => s.clone(),
            _ => panic!("expected utf8 constant at pool index {index}"),
        }
    }

    fn class_name(&self, index: u16) -> String {
        match self.pool.get(&index) {
            Some(CpEntry::Class(name_ref)) => self.utf8(*name_ref),
            _ => panic!("expected class constant at pool index {index}"),
        }
    }

    fn member_ref(&self, pool_index: u16) -> MemberRef {
        match self.pool.get(&pool_index) {
            Some(CpEntry::Ref(class_idx, nat_idx)) => {
                let owner = self.class_name(*class_idx);
                match self.pool.get(nat_idx) {
                    Some(CpEntry::NameAndType(name_ref, desc_ref)) => {
                        MemberRef { owner, name: self.utf8(*name_ref), descriptor: self.utf8(*desc_ref) }
                    }
                    _ => panic!("expected NameAndType at pool index {nat_idx}"),
                }
            }
            other => panic!("expected a Fieldref/Methodref/InterfaceMethodref at pool index {pool_index}, found {other:?}"),
        }
    }

    /// Resolve the `Methodref`/`InterfaceMethodref`/`Fieldref` operand of the
    /// first occurrence of `opcode` in `code` (a two-byte constant pool index
    /// immediately following the opcode byte, as for every `invoke*`/
    /// `getstatic`/`putstatic`/`getfield`/`putfield` instruction).
    pub fn first_member_ref(&self, code: &[u8], opcode: u8) -> Option<MemberRef> {
        let at = code.iter().position(|&b| b == opcode)?;
        let index = u16::from_be_bytes([code[at + 1], code[at + 2]]);
        Some(self.member_ref(index))
    }
}

impl std::fmt::Debug for CpEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpEntry::Utf8(s) => write!(f, "Utf8({s:?})"),
            CpEntry::Class(r) => write!(f, "Class({r})"),
            CpEntry::NameAndType(n, t) => write!(f, "NameAndType({n}, {t})"),
            CpEntry::Ref(c, n) => write!(f, "Ref({c}, {n})"),
            CpEntry::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::classfile::ClassFile;

    #[test]
    fn round_trips_a_trivial_class() {
        let mut cf = ClassFile::new("app/Main", "java/lang/Object", 52);
        {
            let mut ctor = cf.new_method(
                crate::classfile::writer::ACC_PUBLIC,
                "<init>",
                "()V",
            );
            ctor.emit_load(crate::types::OpcodeFamily::Reference, 0);
            ctor.emit_invokespecial("java/lang/Object", "<init>", "()V");
            ctor.emit_return(None);
            ctor.finish();
        }
        let bytes = cf.to_bytes();
        let parsed = parse(&bytes);
        assert_eq!(parsed.major_version, 52);
        assert_eq!(parsed.this_class, "app/Main");
        assert_eq!(parsed.super_class, "java/lang/Object");
        let ctor = parsed.method("<init>").expect("constructor present");
        assert_eq!(ctor.descriptor, "()V");
        assert!(ctor.code.is_some());
    }
}
