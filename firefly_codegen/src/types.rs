//! C3 — the type descriptor layer.
//!
//! Bidirectional mapping between Firefly surface types, the internal
//! [`VarType`] value category, JVM descriptor strings, and the load/store/
//! return opcode family a value of that category requires.

use crate::ast::SurfaceType;

/// Internal value category tracked by the lowerer. Every emission step
/// updates the "last produced category" so the caller knows what sits on
/// top of the operand stack without modeling the stack itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Int,
    Long,
    /// Also covers source `Float`; see spec's open question on FLOAT vs DOUBLE.
    Double,
    Boolean,
    String,
    StringArray,
    Object,
}

impl VarType {
    /// Number of local-variable-table / operand-stack slots this category
    /// occupies. Long and double are two-slot categories on the JVM; every
    /// other category, including boolean (stored as `int`), is one slot.
    pub fn slot_size(self) -> u16 {
        match self {
            VarType::Long | VarType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(self) -> bool {
        self.slot_size() == 2
    }

    /// True when values of this category are represented as JVM primitives
    /// rather than object references.
    pub fn is_primitive(self) -> bool {
        matches!(self, VarType::Int | VarType::Long | VarType::Double | VarType::Boolean)
    }

    /// The JVM descriptor for a bare value of this category.
    pub fn descriptor(self) -> &'static str {
        match self {
            VarType::Int => "I",
            VarType::Long => "J",
            VarType::Double => "D",
            VarType::Boolean => "Z",
            VarType::String => "Ljava/lang/String;",
            VarType::StringArray => "[Ljava/lang/String;",
            VarType::Object => "Ljava/lang/Object;",
        }
    }

    /// The wrapper class internal name used when boxing this category into
    /// an `Object`-typed location. Reference categories box to themselves.
    pub fn boxed_internal_name(self) -> &'static str {
        match self {
            VarType::Int => "java/lang/Integer",
            VarType::Long => "java/lang/Long",
            VarType::Double => "java/lang/Double",
            VarType::Boolean => "java/lang/Boolean",
            VarType::String => "java/lang/String",
            VarType::StringArray => "[Ljava/lang/String;",
            VarType::Object => "java/lang/Object",
        }
    }

    /// `valueOf` descriptor used to box a primitive of this category.
    pub fn box_descriptor(self) -> Option<&'static str> {
        match self {
            VarType::Int => Some("(I)Ljava/lang/Integer;"),
            VarType::Long => Some("(J)Ljava/lang/Long;"),
            VarType::Double => Some("(D)Ljava/lang/Double;"),
            VarType::Boolean => Some("(Z)Ljava/lang/Boolean;"),
            _ => None,
        }
    }

    /// `*Value()` method name used to unbox an `Object` back to this
    /// primitive category, and its descriptor.
    pub fn unbox_method(self) -> Option<(&'static str, &'static str)> {
        match self {
            VarType::Int => Some(("intValue", "()I")),
            VarType::Long => Some(("longValue", "()J")),
            VarType::Double => Some(("doubleValue", "()D")),
            VarType::Boolean => Some(("booleanValue", "()Z")),
            _ => None,
        }
    }

    /// Derive the value category of a fully-resolved surface type.
    pub fn from_surface(ty: &SurfaceType) -> VarType {
        match ty {
            SurfaceType::Primitive(PrimitiveKind::Int) => VarType::Int,
            SurfaceType::Primitive(PrimitiveKind::Long) => VarType::Long,
            SurfaceType::Primitive(PrimitiveKind::Float) => VarType::Double,
            SurfaceType::Primitive(PrimitiveKind::Double) => VarType::Double,
            SurfaceType::Primitive(PrimitiveKind::Bool) => VarType::Boolean,
            SurfaceType::Primitive(PrimitiveKind::String) => VarType::String,
            SurfaceType::Primitive(PrimitiveKind::Void) => VarType::Object,
            SurfaceType::Array(elem)
                if matches!(**elem, SurfaceType::Primitive(PrimitiveKind::String)) =>
            {
                VarType::StringArray
            }
            _ => VarType::Object,
        }
    }

    /// Opcode family selector used by `classfile::opcodes` for
    /// load/store/return of this category. `Object`, `String`, `StringArray`
    /// all use the `a`-prefixed reference instruction family.
    pub fn opcode_family(self) -> OpcodeFamily {
        match self {
            VarType::Int | VarType::Boolean => OpcodeFamily::Int,
            VarType::Long => OpcodeFamily::Long,
            VarType::Double => OpcodeFamily::Double,
            VarType::String | VarType::StringArray | VarType::Object => OpcodeFamily::Reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeFamily {
    Int,
    Long,
    Double,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    String,
    Void,
}

impl PrimitiveKind {
    /// The JVM descriptor of this primitive surface kind. `Float` maps to
    /// `D`: the spec's open question records that Firefly's `Float` is
    /// treated as a 64-bit JVM `double` throughout, not a 32-bit `float`.
    pub fn descriptor(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "I",
            PrimitiveKind::Long => "J",
            PrimitiveKind::Float => "D",
            PrimitiveKind::Double => "D",
            PrimitiveKind::Bool => "Z",
            PrimitiveKind::String => "Ljava/lang/String;",
            PrimitiveKind::Void => "V",
        }
    }
}

/// Render a resolved surface type as a JVM field descriptor. Unlike
/// [`VarType::descriptor`], this preserves the exact element type of
/// generics/arrays erased to `Object` by `VarType` — used wherever a
/// precise descriptor (constant pool entries, field signatures) is needed
/// rather than just an opcode-selection category.
pub fn surface_descriptor(ty: &SurfaceType) -> String {
    match ty {
        SurfaceType::Primitive(p) => p.descriptor().to_string(),
        SurfaceType::Named(name) => format!("L{};", name.replace('.', "/")),
        SurfaceType::Generic(base, _args) => surface_descriptor(base),
        SurfaceType::Optional(inner) => surface_descriptor(inner),
        SurfaceType::Array(elem) => format!("[{}", surface_descriptor(elem)),
        SurfaceType::Function(..) => "Ljava/util/function/Function;".to_string(),
        SurfaceType::Tuple(_) => "Ljava/util/List;".to_string(),
        SurfaceType::TypeParam(..) => "Ljava/lang/Object;".to_string(),
    }
}

/// True when `descriptor` names a JVM primitive (single uppercase letter
/// other than the array marker).
pub fn is_primitive_descriptor(descriptor: &str) -> bool {
    matches!(descriptor, "I" | "J" | "D" | "F" | "Z" | "B" | "C" | "S" | "V")
}

/// Map a raw field/return descriptor back to the lowerer's value category.
/// `Float` (`F`) is included for descriptors that originate outside surface
/// types (e.g. reflected JDK members); Firefly source itself never produces
/// `F`, only `D` (see [`PrimitiveKind::descriptor`]'s note).
pub fn descriptor_to_var_type(descriptor: &str) -> VarType {
    match descriptor {
        "Z" => VarType::Boolean,
        "I" | "B" | "C" | "S" => VarType::Int,
        "J" => VarType::Long,
        "D" | "F" => VarType::Double,
        "Ljava/lang/String;" => VarType::String,
        "[Ljava/lang/String;" => VarType::StringArray,
        _ => VarType::Object,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slot_size_matches_jvm_two_slot_categories() {
        assert_eq!(VarType::Long.slot_size(), 2);
        assert_eq!(VarType::Double.slot_size(), 2);
        assert_eq!(VarType::Int.slot_size(), 1);
        assert_eq!(VarType::Object.slot_size(), 1);
    }

    #[test]
    fn float_surface_type_maps_to_double_category() {
        let ty = SurfaceType::Primitive(PrimitiveKind::Float);
        assert_eq!(VarType::from_surface(&ty), VarType::Double);
        assert_eq!(PrimitiveKind::Float.descriptor(), "D");
    }

    #[test]
    fn array_of_string_is_string_array_category() {
        let ty = SurfaceType::Array(Box::new(SurfaceType::Primitive(PrimitiveKind::String)));
        assert_eq!(VarType::from_surface(&ty), VarType::StringArray);
    }
}
