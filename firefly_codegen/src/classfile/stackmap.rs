//! `StackMapTable` frame model and serialization (JVM spec §4.7.4).
//!
//! The writer records a full [`VerificationFrame`] (locals + operand stack)
//! at every branch target and exception handler entry; [`encode_frames`]
//! then computes the delta offsets and picks the most compact same/
//! same-locals-1-stack-item/same-extended/full-frame encoding for each.

use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::classfile::constant_pool::ConstantPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object(String),
    /// Offset of the `new` instruction that produced this not-yet-
    /// initialized object reference.
    Uninitialized(u16),
}

impl VerificationType {
    fn write(&self, pool: &mut ConstantPool, out: &mut impl Write) -> io::Result<()> {
        match self {
            VerificationType::Top => out.write_u8(0),
            VerificationType::Integer => out.write_u8(1),
            VerificationType::Float => out.write_u8(2),
            VerificationType::Double => out.write_u8(3),
            VerificationType::Long => out.write_u8(4),
            VerificationType::Null => out.write_u8(5),
            VerificationType::UninitializedThis => out.write_u8(6),
            VerificationType::Object(internal_name) => {
                out.write_u8(7)?;
                let class_ref = pool.class(internal_name.clone());
                out.write_u16::<BigEndian>(class_ref)
            }
            VerificationType::Uninitialized(offset) => {
                out.write_u8(8)?;
                out.write_u16::<BigEndian>(*offset)
            }
        }
    }

    /// Long/double occupy the following slot with an implicit `Top`, both
    /// in the locals array and when counting verification-type-list length.
    pub fn occupies_two_slots(&self) -> bool {
        matches!(self, VerificationType::Long | VerificationType::Double)
    }
}

#[derive(Debug, Clone)]
pub struct VerificationFrame {
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

pub struct StackMapFrameEntry {
    pub bytecode_offset: u32,
    pub frame: VerificationFrame,
}

fn frame_locals_eq(a: &[VerificationType], b: &[VerificationType]) -> bool {
    a == b
}

/// Encode a sequence of frames (already sorted by ascending bytecode
/// offset) into the body of a `StackMapTable` attribute, given the
/// method's implicit initial frame (computed from its descriptor).
pub fn encode_frames(
    initial: &VerificationFrame,
    frames: &[StackMapFrameEntry],
    pool: &mut ConstantPool,
) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_u16::<BigEndian>(frames.len() as u16)?;

    let mut previous_offset: i64 = -1;
    let mut previous_locals: &[VerificationType] = &initial.locals;

    for entry in frames {
        let delta = (entry.bytecode_offset as i64 - previous_offset - 1) as u32;
        let same_locals = frame_locals_eq(previous_locals, &entry.frame.locals);

        if same_locals && entry.frame.stack.is_empty() {
            if delta <= 63 {
                buf.write_u8(delta as u8)?;
            } else {
                buf.write_u8(251)?; // same_frame_extended
                buf.write_u16::<BigEndian>(delta as u16)?;
            }
        } else if same_locals && entry.frame.stack.len() == 1 {
            if delta <= 63 {
                buf.write_u8(64 + delta as u8)?;
            } else {
                buf.write_u8(247)?; // same_locals_1_stack_item_frame_extended
                buf.write_u16::<BigEndian>(delta as u16)?;
            }
            entry.frame.stack[0].write(pool, &mut buf)?;
        } else {
            // full_frame: always correct, used whenever the compact forms
            // (chop/append of up to 3 locals) don't trivially apply.
            buf.write_u8(255)?;
            buf.write_u16::<BigEndian>(delta as u16)?;
            buf.write_u16::<BigEndian>(verification_type_list_len(&entry.frame.locals))?;
            for l in &entry.frame.locals {
                l.write(pool, &mut buf)?;
            }
            buf.write_u16::<BigEndian>(verification_type_list_len(&entry.frame.stack))?;
            for s in &entry.frame.stack {
                s.write(pool, &mut buf)?;
            }
        }

        previous_offset = entry.bytecode_offset as i64;
        previous_locals = &entry.frame.locals;
    }

    Ok(buf)
}

/// Entry count as the verifier counts it: a long/double entry counts once
/// in the list, but the table format emits no separate `Top` continuation
/// for locals/stack verification-type *lists* (unlike LVT slot indices).
fn verification_type_list_len(types: &[VerificationType]) -> u16 {
    types.len() as u16
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_frame_for_small_offset_no_stack() {
        let mut pool = ConstantPool::default();
        let initial = VerificationFrame { locals: vec![], stack: vec![] };
        let frames = vec![StackMapFrameEntry {
            bytecode_offset: 5,
            frame: VerificationFrame { locals: vec![], stack: vec![] },
        }];
        let encoded = encode_frames(&initial, &frames, &mut pool).unwrap();
        // count(2 bytes) + one-byte same_frame tag
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded[2], 5);
    }

    #[test]
    fn full_frame_when_locals_change() {
        let mut pool = ConstantPool::default();
        let initial = VerificationFrame { locals: vec![], stack: vec![] };
        let frames = vec![StackMapFrameEntry {
            bytecode_offset: 0,
            frame: VerificationFrame {
                locals: vec![VerificationType::Integer],
                stack: vec![],
            },
        }];
        let encoded = encode_frames(&initial, &frames, &mut pool).unwrap();
        assert_eq!(encoded[2], 255);
    }
}
