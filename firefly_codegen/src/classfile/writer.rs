//! The class file writer: opens one writer per declaration, accumulates
//! fields/methods/nested-class attributes, and serializes a complete
//! class-file-version-52 byte blob. Grounded on the `ClassFileWriter`/
//! `MethodWriter` split from the pack's `jvlm` classfile module, adapted
//! to also auto-compute `StackMapTable` frames at caller-supplied join
//! points (the lowerer always knows where control-flow joins; asking it
//! to submit a frame there is simpler and more robust than a full
//! dataflow fixpoint pass over arbitrary bytecode).

use std::collections::HashMap;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::classfile::constant_pool::{ConstantPool, ConstantPoolRef, MethodHandleKind};
use crate::classfile::stackmap::{encode_frames, StackMapFrameEntry, VerificationFrame, VerificationType};
use crate::types::OpcodeFamily;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

/// class-file-version 52, i.e. Java 8 (spec §6).
pub const DEFAULT_MAJOR_VERSION: u16 = 52;

pub struct ClassFile {
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: String,
    pub interfaces: Vec<String>,
    constant_pool: ConstantPool,
    fields: Vec<FieldEntry>,
    methods: Vec<MethodEntry>,
    class_annotations: Vec<AnnotationEntry>,
}

struct FieldEntry {
    access_flags: u16,
    name: String,
    descriptor: String,
    constant_value: Option<ConstantPoolRef>,
}

pub struct AnnotationEntry {
    pub type_descriptor: String,
    pub elements: Vec<(String, AnnotationElementValue)>,
}

pub enum AnnotationElementValue {
    Int(i32),
    Double(f64),
    Boolean(bool),
    String(String),
    Array(Vec<AnnotationElementValue>),
}

struct MethodEntry {
    access_flags: u16,
    name: String,
    descriptor: String,
    code: Option<CodeAttribute>,
}

struct CodeAttribute {
    max_stack: u16,
    max_locals: u16,
    bytes: Vec<u8>,
    exception_table: Vec<ExceptionTableEntry>,
    line_numbers: Vec<(u16, u16)>,
    stack_map_frames: Vec<StackMapFrameEntry>,
    initial_frame: VerificationFrame,
}

#[derive(Clone)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` encodes a catch-all (used for `finally` regions).
    pub catch_type: Option<String>,
}

impl ClassFile {
    pub fn new(this_class: impl Into<String>, super_class: impl Into<String>, major_version: u16) -> Self {
        Self {
            major_version,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: this_class.into(),
            super_class: super_class.into(),
            interfaces: Vec::new(),
            constant_pool: ConstantPool::default(),
            fields: Vec::new(),
            methods: Vec::new(),
            class_annotations: Vec::new(),
        }
    }

    pub fn constant_pool(&mut self) -> &mut ConstantPool {
        &mut self.constant_pool
    }

    pub fn add_field(&mut self, access_flags: u16, name: impl Into<String>, descriptor: impl Into<String>) {
        self.fields.push(FieldEntry {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            constant_value: None,
        });
    }

    pub fn add_annotation(&mut self, annotation: AnnotationEntry) {
        self.class_annotations.push(annotation);
    }

    pub fn new_method(&mut self, access_flags: u16, name: impl Into<String>, descriptor: impl Into<String>) -> MethodBuilder<'_> {
        let name = name.into();
        let descriptor = descriptor.into();
        let initial_frame = initial_frame_for_descriptor(&descriptor, access_flags & ACC_STATIC == 0, &self.this_class);
        let index = self.methods.len();
        self.methods.push(MethodEntry {
            access_flags,
            name,
            descriptor,
            code: None,
        });
        MethodBuilder {
            class: self,
            method_index: index,
            current: initial_frame.clone(),
            initial_frame,
            bytes: Vec::new(),
            max_stack: 0,
            exception_table: Vec::new(),
            line_numbers: Vec::new(),
            stack_map_frames: Vec::new(),
            last_line: None,
            max_locals: 0,
        }
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out).expect("writing to a Vec<u8> cannot fail");
        out
    }

    fn write(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        // Pre-intern everything so the constant pool is complete before we
        // serialize it; the class writer itself owns no I/O state besides
        // the byte vector it returns.
        let this_ref = self.constant_pool.class(self.this_class.clone());
        let super_ref = self.constant_pool.class(self.super_class.clone());
        let interface_refs: Vec<_> = self
            .interfaces
            .clone()
            .into_iter()
            .map(|i| self.constant_pool.class(i))
            .collect();

        let code_attr_name = self.constant_pool.utf8("Code");
        let line_number_attr_name = self.constant_pool.utf8("LineNumberTable");
        let stack_map_attr_name = self.constant_pool.utf8("StackMapTable");
        let bootstrap_attr_name = self.constant_pool.utf8("BootstrapMethods");
        let rt_visible_annotations_name = self.constant_pool.utf8("RuntimeVisibleAnnotations");

        let mut field_blobs = Vec::new();
        for field in &self.fields {
            let name_ref = self.constant_pool.utf8(field.name.clone());
            let desc_ref = self.constant_pool.utf8(field.descriptor.clone());
            field_blobs.push((field.access_flags, name_ref, desc_ref, field.constant_value));
        }

        let mut method_blobs = Vec::new();
        for method in &self.methods {
            let name_ref = self.constant_pool.utf8(method.name.clone());
            let desc_ref = self.constant_pool.utf8(method.descriptor.clone());
            let code_bytes = method
                .code
                .as_ref()
                .map(|c| encode_code_attribute(c, &mut self.constant_pool, line_number_attr_name, stack_map_attr_name))
                .transpose()?;
            method_blobs.push((method.access_flags, name_ref, desc_ref, code_bytes));
        }

        let mut class_annotation_blobs = Vec::new();
        for ann in &self.class_annotations {
            class_annotation_blobs.push(encode_annotation(ann, &mut self.constant_pool)?);
        }

        out.write_u32::<BigEndian>(0xCAFE_BABE)?;
        out.write_u16::<BigEndian>(0)?; // minor
        out.write_u16::<BigEndian>(self.major_version)?;

        self.constant_pool.write(out)?;

        out.write_u16::<BigEndian>(self.access_flags)?;
        out.write_u16::<BigEndian>(this_ref)?;
        out.write_u16::<BigEndian>(super_ref)?;
        out.write_u16::<BigEndian>(interface_refs.len() as u16)?;
        for i in interface_refs {
            out.write_u16::<BigEndian>(i)?;
        }

        out.write_u16::<BigEndian>(field_blobs.len() as u16)?;
        for (access, name_ref, desc_ref, _constant_value) in &field_blobs {
            out.write_u16::<BigEndian>(*access)?;
            out.write_u16::<BigEndian>(*name_ref)?;
            out.write_u16::<BigEndian>(*desc_ref)?;
            out.write_u16::<BigEndian>(0)?; // no field attributes
        }

        out.write_u16::<BigEndian>(method_blobs.len() as u16)?;
        for (access, name_ref, desc_ref, code_bytes) in &method_blobs {
            out.write_u16::<BigEndian>(*access)?;
            out.write_u16::<BigEndian>(*name_ref)?;
            out.write_u16::<BigEndian>(*desc_ref)?;
            match code_bytes {
                Some(code) => {
                    out.write_u16::<BigEndian>(1)?;
                    out.write_u16::<BigEndian>(code_attr_name)?;
                    out.write_u32::<BigEndian>(code.len() as u32)?;
                    out.write_all(code)?;
                }
                None => {
                    out.write_u16::<BigEndian>(0)?;
                }
            }
        }

        let has_bootstrap = self.constant_pool.has_bootstrap_methods();
        let has_class_annotations = !class_annotation_blobs.is_empty();
        let class_attr_count = has_bootstrap as u16 + has_class_annotations as u16;
        out.write_u16::<BigEndian>(class_attr_count)?;
        if has_bootstrap {
            let mut bsm_buf = Vec::new();
            self.constant_pool.write_bootstrap_methods_attribute(&mut bsm_buf)?;
            out.write_u16::<BigEndian>(bootstrap_attr_name)?;
            out.write_u32::<BigEndian>(bsm_buf.len() as u32)?;
            out.write_all(&bsm_buf)?;
        }
        if has_class_annotations {
            let mut ann_buf = Vec::new();
            ann_buf.write_u16::<BigEndian>(class_annotation_blobs.len() as u16)?;
            for blob in &class_annotation_blobs {
                ann_buf.write_all(blob)?;
            }
            out.write_u16::<BigEndian>(rt_visible_annotations_name)?;
            out.write_u32::<BigEndian>(ann_buf.len() as u32)?;
            out.write_all(&ann_buf)?;
        }

        Ok(())
    }
}

fn encode_annotation(annotation: &AnnotationEntry, pool: &mut ConstantPool) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let type_ref = pool.utf8(annotation.type_descriptor.clone());
    buf.write_u16::<BigEndian>(type_ref)?;
    buf.write_u16::<BigEndian>(annotation.elements.len() as u16)?;
    for (name, value) in &annotation.elements {
        let name_ref = pool.utf8(name.clone());
        buf.write_u16::<BigEndian>(name_ref)?;
        encode_annotation_value(value, pool, &mut buf)?;
    }
    Ok(buf)
}

fn encode_annotation_value(value: &AnnotationElementValue, pool: &mut ConstantPool, buf: &mut Vec<u8>) -> io::Result<()> {
    match value {
        AnnotationElementValue::Int(v) => {
            buf.write_u8(b'I')?;
            let r = pool.integer(*v);
            buf.write_u16::<BigEndian>(r)
        }
        AnnotationElementValue::Double(v) => {
            buf.write_u8(b'D')?;
            let r = pool.double(*v);
            buf.write_u16::<BigEndian>(r)
        }
        AnnotationElementValue::Boolean(v) => {
            buf.write_u8(b'Z')?;
            let r = pool.integer(if *v { 1 } else { 0 });
            buf.write_u16::<BigEndian>(r)
        }
        AnnotationElementValue::String(v) => {
            buf.write_u8(b's')?;
            let r = pool.utf8(v.clone());
            buf.write_u16::<BigEndian>(r)
        }
        AnnotationElementValue::Array(items) => {
            buf.write_u8(b'[')?;
            buf.write_u16::<BigEndian>(items.len() as u16)?;
            for item in items {
                encode_annotation_value(item, pool, buf)?;
            }
            Ok(())
        }
    }
}

fn encode_code_attribute(
    code: &CodeAttribute,
    pool: &mut ConstantPool,
    line_number_attr_name: ConstantPoolRef,
    stack_map_attr_name: ConstantPoolRef,
) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u16::<BigEndian>(code.max_stack)?;
    out.write_u16::<BigEndian>(code.max_locals)?;
    out.write_u32::<BigEndian>(code.bytes.len() as u32)?;
    out.write_all(&code.bytes)?;

    out.write_u16::<BigEndian>(code.exception_table.len() as u16)?;
    for e in &code.exception_table {
        out.write_u16::<BigEndian>(e.start_pc)?;
        out.write_u16::<BigEndian>(e.end_pc)?;
        out.write_u16::<BigEndian>(e.handler_pc)?;
        let catch_ref = match &e.catch_type {
            Some(name) => pool.class(name.clone()),
            None => 0,
        };
        out.write_u16::<BigEndian>(catch_ref)?;
    }

    let has_lines = !code.line_numbers.is_empty();
    let has_frames = !code.stack_map_frames.is_empty();
    out.write_u16::<BigEndian>(has_lines as u16 + has_frames as u16)?;

    if has_lines {
        let mut buf = Vec::new();
        buf.write_u16::<BigEndian>(code.line_numbers.len() as u16)?;
        for (pc, line) in &code.line_numbers {
            buf.write_u16::<BigEndian>(*pc)?;
            buf.write_u16::<BigEndian>(*line)?;
        }
        out.write_u16::<BigEndian>(line_number_attr_name)?;
        out.write_u32::<BigEndian>(buf.len() as u32)?;
        out.write_all(&buf)?;
    }

    if has_frames {
        let buf = encode_frames(&code.initial_frame, &code.stack_map_frames, pool)?;
        out.write_u16::<BigEndian>(stack_map_attr_name)?;
        out.write_u32::<BigEndian>(buf.len() as u32)?;
        out.write_all(&buf)?;
    }

    Ok(out)
}

/// Verification frame implied by a method descriptor and its staticness,
/// used as the implicit frame at bytecode offset 0 and as the base every
/// `StackMapTable` entry's offset delta is measured against.
fn initial_frame_for_descriptor(descriptor: &str, is_instance: bool, this_class: &str) -> VerificationFrame {
    let mut locals = Vec::new();
    if is_instance {
        locals.push(VerificationType::Object(this_class.to_string()));
    }
    let (params, _ret) = crate::classfile::descriptor::parse_method_descriptor(descriptor).unwrap_or_default();
    for p in params {
        locals.push(verification_type_for_descriptor(&p));
    }
    VerificationFrame { locals, stack: Vec::new() }
}

fn verification_type_for_descriptor(descriptor: &str) -> VerificationType {
    match descriptor {
        "I" | "Z" | "B" | "C" | "S" => VerificationType::Integer,
        "J" => VerificationType::Long,
        "D" | "F" => VerificationType::Double,
        d if d.starts_with('L') || d.starts_with('[') => {
            VerificationType::Object(d.trim_start_matches('L').trim_end_matches(';').to_string())
        }
        _ => VerificationType::Top,
    }
}

/// Opaque code offset, valid only within the `MethodBuilder` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CodeLocation(pub u32);

/// A forward branch awaiting its target; `set_target` patches the 16-bit
/// offset once the destination is known.
pub struct BranchTarget {
    instruction_offset: u32,
    operand_offset: usize,
}

pub struct MethodBuilder<'a> {
    class: &'a mut ClassFile,
    method_index: usize,
    current: VerificationFrame,
    initial_frame: VerificationFrame,
    bytes: Vec<u8>,
    max_stack: u16,
    exception_table: Vec<ExceptionTableEntry>,
    line_numbers: Vec<(u16, u16)>,
    stack_map_frames: Vec<StackMapFrameEntry>,
    last_line: Option<usize>,
    max_locals: u16,
}

impl<'a> MethodBuilder<'a> {
    pub fn pool(&mut self) -> &mut ConstantPool {
        self.class.constant_pool()
    }

    pub fn this_class(&self) -> String {
        self.class.this_class.clone()
    }

    fn push(&mut self, vt: VerificationType) {
        let wide = vt.occupies_two_slots();
        self.current.stack.push(vt);
        let depth = self.stack_depth();
        if depth > self.max_stack {
            self.max_stack = depth;
        }
        let _ = wide;
    }

    fn pop(&mut self) -> VerificationType {
        self.current.stack.pop().expect("pop from empty virtual operand stack")
    }

    fn stack_depth(&self) -> u16 {
        self.current
            .stack
            .iter()
            .map(|t| if t.occupies_two_slots() { 2 } else { 1 })
            .sum()
    }

    pub fn current_frame(&self) -> VerificationFrame {
        self.current.clone()
    }

    pub fn set_current_frame(&mut self, frame: VerificationFrame) {
        self.current = frame;
    }

    pub fn current_location(&self) -> CodeLocation {
        CodeLocation(self.bytes.len() as u32)
    }

    /// Record a `LineNumberTable` entry at the current bytecode offset.
    pub fn mark_line(&mut self, line: usize) {
        if self.last_line == Some(line) {
            return;
        }
        self.last_line = Some(line);
        self.line_numbers.push((self.bytes.len() as u16, line as u16));
    }

    /// Snapshot the current virtual frame as a `StackMapTable` entry at the
    /// given location — the lowerer calls this at every branch target and
    /// loop/join label it emits, since it always knows the join shape by
    /// construction (spec §4.4's uniform-stack-shape join discipline).
    pub fn mark_frame(&mut self, location: CodeLocation) {
        self.stack_map_frames.push(StackMapFrameEntry {
            bytecode_offset: location.0,
            frame: self.current.clone(),
        });
    }

    fn write_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    // ---- local variable access ----

    fn emit_var_opcode(&mut self, shorthand_base: u8, wide_opcode: u8, index: u16) {
        match index {
            0 => self.write_u8(shorthand_base),
            1 => self.write_u8(shorthand_base + 1),
            2 => self.write_u8(shorthand_base + 2),
            3 => self.write_u8(shorthand_base + 3),
            i if i <= 0xff => {
                self.write_u8(wide_opcode);
                self.write_u8(i as u8);
            }
            i => {
                self.write_u8(0xc4); // WIDE
                self.write_u8(wide_opcode);
                self.write_u16(i);
            }
        }
    }

    pub fn emit_load(&mut self, family: OpcodeFamily, index: u16) {
        use crate::classfile::opcodes::*;
        let (load0, _store0, load, _store) = load_store_shorthand(family);
        self.emit_var_opcode(load0, load, index);
        let vt = match family {
            OpcodeFamily::Int => VerificationType::Integer,
            OpcodeFamily::Long => VerificationType::Long,
            OpcodeFamily::Double => VerificationType::Double,
            OpcodeFamily::Reference => VerificationType::Object("java/lang/Object".to_string()),
        };
        self.push(vt);
    }

    pub fn emit_aload_typed(&mut self, index: u16, internal_name: impl Into<String>) {
        use crate::classfile::opcodes::*;
        let (load0, _s0, load, _s) = load_store_shorthand(OpcodeFamily::Reference);
        self.emit_var_opcode(load0, load, index);
        self.push(VerificationType::Object(internal_name.into()));
    }

    pub fn emit_store(&mut self, family: OpcodeFamily, index: u16) {
        use crate::classfile::opcodes::*;
        let (_l0, store0, _l, store) = load_store_shorthand(family);
        self.pop();
        self.emit_var_opcode(store0, store, index);
    }

    pub fn emit_iinc(&mut self, index: u16, delta: i16) {
        if let (Ok(i), Ok(d)) = (u8::try_from(index), i8::try_from(delta)) {
            self.write_u8(crate::classfile::opcodes::IINC);
            self.write_u8(i);
            self.write_i8(d);
        } else {
            self.write_u8(0xc4);
            self.write_u8(crate::classfile::opcodes::IINC);
            self.write_u16(index);
            self.bytes.extend_from_slice(&delta.to_be_bytes());
        }
    }

    // ---- constants ----

    pub fn emit_aconst_null(&mut self) {
        self.write_u8(crate::classfile::opcodes::ACONST_NULL);
        self.push(VerificationType::Null);
    }

    pub fn emit_iconst(&mut self, value: i32) {
        use crate::classfile::opcodes::*;
        match value {
            -1 => self.write_u8(ICONST_M1),
            0 => self.write_u8(ICONST_0),
            1 => self.write_u8(ICONST_1),
            2 => self.write_u8(ICONST_2),
            3 => self.write_u8(ICONST_3),
            4 => self.write_u8(ICONST_4),
            5 => self.write_u8(ICONST_5),
            v if (-128..=127).contains(&v) => {
                self.write_u8(BIPUSH);
                self.write_i8(v as i8);
            }
            v if (-32768..=32767).contains(&v) => {
                self.write_u8(SIPUSH);
                self.bytes.extend_from_slice(&(v as i16).to_be_bytes());
            }
            v => {
                let r = self.pool().integer(v);
                self.emit_ldc_ref(r);
            }
        }
        self.push(VerificationType::Integer);
    }

    pub fn emit_lconst(&mut self, value: i64) {
        use crate::classfile::opcodes::*;
        match value {
            0 => self.write_u8(LCONST_0),
            1 => self.write_u8(LCONST_1),
            v => {
                let r = self.pool().long(v);
                self.write_u8(LDC2_W);
                self.write_u16(r);
            }
        }
        self.push(VerificationType::Long);
    }

    pub fn emit_dconst(&mut self, value: f64) {
        use crate::classfile::opcodes::*;
        if value == 0.0 {
            self.write_u8(DCONST_0);
        } else if value == 1.0 {
            self.write_u8(DCONST_1);
        } else {
            let r = self.pool().double(value);
            self.write_u8(LDC2_W);
            self.write_u16(r);
        }
        self.push(VerificationType::Double);
    }

    pub fn emit_ldc_string(&mut self, value: impl Into<String>) {
        let r = self.pool().string(value);
        self.emit_ldc_ref(r);
        self.push(VerificationType::Object("java/lang/String".to_string()));
    }

    fn emit_ldc_ref(&mut self, r: ConstantPoolRef) {
        use crate::classfile::opcodes::*;
        if let Ok(b) = u8::try_from(r) {
            self.write_u8(LDC);
            self.write_u8(b);
        } else {
            self.write_u8(LDC_W);
            self.write_u16(r);
        }
    }

    // ---- stack manipulation ----

    pub fn emit_pop(&mut self) {
        let vt = self.pop();
        if vt.occupies_two_slots() {
            self.write_u8(crate::classfile::opcodes::POP2);
        } else {
            self.write_u8(crate::classfile::opcodes::POP);
        }
    }

    pub fn emit_dup(&mut self) {
        let vt = self.pop();
        self.push(vt.clone());
        self.push(vt);
        self.write_u8(crate::classfile::opcodes::DUP);
    }

    // ---- arithmetic ----

    pub fn emit_binary_arith(&mut self, opcode: u8, family: OpcodeFamily) {
        self.pop();
        self.pop();
        self.write_u8(opcode);
        let vt = match family {
            OpcodeFamily::Int => VerificationType::Integer,
            OpcodeFamily::Long => VerificationType::Long,
            OpcodeFamily::Double => VerificationType::Double,
            OpcodeFamily::Reference => unreachable!(),
        };
        self.push(vt);
    }

    pub fn emit_neg(&mut self, opcode: u8) {
        let vt = self.pop();
        self.write_u8(opcode);
        self.push(vt);
    }

    pub fn emit_lcmp(&mut self) {
        self.pop();
        self.pop();
        self.write_u8(crate::classfile::opcodes::LCMP);
        self.push(VerificationType::Integer);
    }

    pub fn emit_dcmp(&mut self, is_g: bool) {
        self.pop();
        self.pop();
        self.write_u8(if is_g { crate::classfile::opcodes::DCMPG } else { crate::classfile::opcodes::DCMPL });
        self.push(VerificationType::Integer);
    }

    pub fn emit_conversion(&mut self, opcode: u8, to: OpcodeFamily) {
        self.pop();
        self.write_u8(opcode);
        let vt = match to {
            OpcodeFamily::Int => VerificationType::Integer,
            OpcodeFamily::Long => VerificationType::Long,
            OpcodeFamily::Double => VerificationType::Double,
            OpcodeFamily::Reference => unreachable!(),
        };
        self.push(vt);
    }

    // ---- branches ----

    #[must_use]
    pub fn emit_goto(&mut self) -> BranchTarget {
        let instruction_offset = self.bytes.len() as u32;
        self.write_u8(crate::classfile::opcodes::GOTO);
        let operand_offset = self.bytes.len();
        self.write_u16(0xFFFF);
        BranchTarget { instruction_offset, operand_offset }
    }

    /// Two-operand int comparison (`IF_ICMP*`); pops both operands.
    #[must_use]
    pub fn emit_if_icmp(&mut self, opcode: u8) -> BranchTarget {
        self.pop();
        self.pop();
        self.emit_branch_opcode(opcode)
    }

    /// Reference equality comparison (`IF_ACMP*`); pops both operands.
    #[must_use]
    pub fn emit_if_acmp(&mut self, opcode: u8) -> BranchTarget {
        self.pop();
        self.pop();
        self.emit_branch_opcode(opcode)
    }

    /// Single-operand comparison against zero/null (`IFEQ`/`IFNULL`/…);
    /// pops one operand.
    #[must_use]
    pub fn emit_if(&mut self, opcode: u8) -> BranchTarget {
        self.pop();
        self.emit_branch_opcode(opcode)
    }

    fn emit_branch_opcode(&mut self, opcode: u8) -> BranchTarget {
        let instruction_offset = self.bytes.len() as u32;
        self.write_u8(opcode);
        let operand_offset = self.bytes.len();
        self.write_u16(0xFFFF);
        BranchTarget { instruction_offset, operand_offset }
    }

    pub fn set_target(&mut self, branch: BranchTarget, target: CodeLocation) {
        let offset = (target.0 as i64 - branch.instruction_offset as i64) as i16;
        self.bytes[branch.operand_offset] = (offset >> 8) as u8;
        self.bytes[branch.operand_offset + 1] = offset as u8;
    }

    // ---- returns ----

    pub fn emit_return(&mut self, family: Option<OpcodeFamily>) {
        if family.is_some() {
            self.pop();
        }
        self.write_u8(crate::classfile::opcodes::return_opcode(family));
    }

    // ---- object model ----

    pub fn emit_new(&mut self, internal_name: impl Into<String>) {
        let name = internal_name.into();
        let r = self.pool().class(name.clone());
        self.write_u8(crate::classfile::opcodes::NEW);
        self.write_u16(r);
        self.push(VerificationType::Object(name));
    }

    pub fn emit_checkcast(&mut self, internal_name: impl Into<String>) {
        let name = internal_name.into();
        let r = self.pool().class(name.clone());
        self.write_u8(crate::classfile::opcodes::CHECKCAST);
        self.write_u16(r);
        self.pop();
        self.push(VerificationType::Object(name));
    }

    pub fn emit_instanceof(&mut self, internal_name: impl Into<String>) {
        let r = self.pool().class(internal_name.into());
        self.write_u8(crate::classfile::opcodes::INSTANCEOF);
        self.write_u16(r);
        self.pop();
        self.push(VerificationType::Integer);
    }

    pub fn emit_athrow(&mut self) {
        self.pop();
        self.write_u8(crate::classfile::opcodes::ATHROW);
    }

    pub fn emit_arraylength(&mut self) {
        self.pop();
        self.write_u8(crate::classfile::opcodes::ARRAYLENGTH);
        self.push(VerificationType::Integer);
    }

    pub fn emit_getfield(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        let vt = verification_type_for_descriptor(&descriptor);
        let r = self.pool().fieldref(owner, name, descriptor);
        self.write_u8(crate::classfile::opcodes::GETFIELD);
        self.write_u16(r);
        self.pop();
        self.push(vt);
    }

    pub fn emit_putfield(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let r = self.pool().fieldref(owner, name, descriptor);
        self.write_u8(crate::classfile::opcodes::PUTFIELD);
        self.write_u16(r);
        self.pop();
        self.pop();
    }

    pub fn emit_getstatic(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        let vt = verification_type_for_descriptor(&descriptor);
        let r = self.pool().fieldref(owner, name, descriptor);
        self.write_u8(crate::classfile::opcodes::GETSTATIC);
        self.write_u16(r);
        self.push(vt);
    }

    pub fn emit_putstatic(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let r = self.pool().fieldref(owner, name, descriptor);
        self.write_u8(crate::classfile::opcodes::PUTSTATIC);
        self.write_u16(r);
        self.pop();
    }

    // ---- calls ----

    fn pop_params(&mut self, descriptor: &str) {
        if let Some((params, _ret)) = crate::classfile::descriptor::parse_method_descriptor(descriptor) {
            for _ in params {
                self.pop();
            }
        }
    }

    fn push_return(&mut self, descriptor: &str) {
        if let Some((_params, ret)) = crate::classfile::descriptor::parse_method_descriptor(descriptor) {
            if ret != "V" {
                self.push(verification_type_for_descriptor(&ret));
            }
        }
    }

    pub fn emit_invokestatic(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        self.pop_params(&descriptor);
        let r = self.pool().methodref(owner, name, descriptor.clone());
        self.write_u8(crate::classfile::opcodes::INVOKESTATIC);
        self.write_u16(r);
        self.push_return(&descriptor);
    }

    pub fn emit_invokevirtual(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        self.pop_params(&descriptor);
        self.pop(); // receiver
        let r = self.pool().methodref(owner, name, descriptor.clone());
        self.write_u8(crate::classfile::opcodes::INVOKEVIRTUAL);
        self.write_u16(r);
        self.push_return(&descriptor);
    }

    pub fn emit_invokespecial(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        self.pop_params(&descriptor);
        self.pop(); // receiver / uninitialized this
        let r = self.pool().methodref(owner, name, descriptor.clone());
        self.write_u8(crate::classfile::opcodes::INVOKESPECIAL);
        self.write_u16(r);
        self.push_return(&descriptor);
    }

    pub fn emit_invokeinterface(&mut self, owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        let param_count = crate::classfile::descriptor::parse_method_descriptor(&descriptor)
            .map(|(p, _)| p.len())
            .unwrap_or(0);
        self.pop_params(&descriptor);
        self.pop(); // receiver
        let r = self.pool().interface_methodref(owner, name, descriptor.clone());
        self.write_u8(crate::classfile::opcodes::INVOKEINTERFACE);
        self.write_u16(r);
        self.write_u8((param_count + 1) as u8);
        self.write_u8(0);
        self.push_return(&descriptor);
    }

    /// `invokedynamic` for `LambdaMetafactory`-backed functional interface
    /// instantiation (C8). `sam_descriptor` is the erased SAM descriptor
    /// (e.g. `()Ljava/lang/Object;` for `Supplier.get`); `instantiated_descriptor`
    /// is the call site's own descriptor (captures as leading params, the
    /// functional interface type as return).
    pub fn emit_invokedynamic_lambda(
        &mut self,
        sam_name: &str,
        sam_descriptor: &str,
        impl_owner: &str,
        impl_name: &str,
        impl_descriptor: &str,
        instantiated_descriptor: &str,
    ) {
        self.pop_params(instantiated_descriptor);

        let method_type_sam = self.pool().method_type(sam_descriptor);
        let method_handle = self
            .pool()
            .method_handle(MethodHandleKind::InvokeStatic, impl_owner, impl_name, impl_descriptor);
        let method_type_impl = self.pool().method_type(impl_descriptor);

        let bootstrap_handle = self.pool().method_handle(
            MethodHandleKind::InvokeStatic,
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
        );

        let indy_ref = self.pool().invoke_dynamic(
            bootstrap_handle,
            vec![method_type_sam, method_handle, method_type_impl],
            sam_name,
            instantiated_descriptor,
        );

        self.write_u8(crate::classfile::opcodes::INVOKEDYNAMIC);
        self.write_u16(indy_ref);
        self.write_u16(0); // reserved, must be zero

        self.push_return(instantiated_descriptor);
    }

    pub fn emit_anewarray(&mut self, element_internal_name: impl Into<String>) {
        let name = element_internal_name.into();
        let r = self.pool().class(name.clone());
        self.pop(); // count
        self.write_u8(crate::classfile::opcodes::ANEWARRAY);
        self.write_u16(r);
        self.push(VerificationType::Object(format!("[L{};", name)));
    }

    pub fn emit_newarray_boolean(&mut self) {
        self.pop(); // count
        self.write_u8(crate::classfile::opcodes::NEWARRAY);
        self.write_u8(crate::classfile::opcodes::NEWARRAY_BOOLEAN);
        self.push(VerificationType::Object("[Z".to_string()));
    }

    pub fn emit_aaload(&mut self) {
        self.pop(); // index
        self.pop(); // arrayref
        self.write_u8(0x32); // AALOAD
        self.push(VerificationType::Object("java/lang/Object".to_string()));
    }

    pub fn emit_aastore(&mut self) {
        self.pop(); // value
        self.pop(); // index
        self.pop(); // arrayref
        self.write_u8(0x53); // AASTORE
    }

    /// Seed the virtual operand stack with the caught exception before a
    /// handler's entry frame is captured. The JVM pushes the thrown value
    /// onto an otherwise-empty stack when control transfers to a handler;
    /// callers mark the handler's frame immediately after this.
    pub fn push_caught_exception(&mut self, internal_name: impl Into<String>) {
        self.current.stack.clear();
        self.push(VerificationType::Object(internal_name.into()));
    }

    /// Register an exception table entry covering the half-open code
    /// range `[start, end)`. `catch_type` is `None` for a catch-all
    /// handler (used for `finally` regions, per spec §4.4).
    pub fn add_exception_handler(&mut self, start: CodeLocation, end: CodeLocation, handler: CodeLocation, catch_type: Option<String>) {
        self.exception_table.push(ExceptionTableEntry {
            start_pc: start.0 as u16,
            end_pc: end.0 as u16,
            handler_pc: handler.0 as u16,
            catch_type,
        });
    }

    /// Allocate a local variable slot for a 1- or 2-slot category past the
    /// method's declared parameter slots, bumping `max_locals` to cover it.
    /// The emitter's `MethodContext` owns the actual monotonic counter;
    /// this only needs to be told the final watermark once at `finish`.
    pub fn note_max_locals(&mut self, slot_count: u16) {
        self.max_locals = self.max_locals.max(slot_count);
    }

    pub fn finish(mut self) {
        // max_locals is fixed up by `note_max_locals`; default covers just
        // the implicit frame if the caller never reports temporaries.
        let initial_locals: u16 = self
            .initial_frame
            .locals
            .iter()
            .map(|t| if t.occupies_two_slots() { 2 } else { 1 })
            .sum();
        self.max_locals = self.max_locals.max(initial_locals);

        let code = CodeAttribute {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            bytes: self.bytes,
            exception_table: self.exception_table,
            line_numbers: self.line_numbers,
            stack_map_frames: self.stack_map_frames,
            initial_frame: self.initial_frame,
        };
        self.class.methods[self.method_index].code = Some(code);
    }
}
