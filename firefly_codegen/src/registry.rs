//! C4 — type pre-registration.
//!
//! A single prepass over the compilation unit that records struct / spark /
//! data-ADT metadata before any declaration body is lowered, so that later
//! emission (field access, struct literals, pattern matching) never depends
//! on declaration order (spec §3, §9 "Cyclic/forward references").

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{ClassDecl, CompilationUnit, Declaration, SparkDecl, StructDecl};
use crate::span::Span;
use crate::types::surface_descriptor;

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub surface_type: crate::ast::SurfaceType,
    pub descriptor: String,
}

/// Shared shape of a struct's or spark's field layout. Field order here is
/// the all-args constructor's parameter order and the `toString`/`equals`/
/// `hashCode` emission order (spec §3 invariant).
#[derive(Debug, Clone)]
pub struct StructInfo {
    pub simple_name: String,
    pub internal_name: String,
    pub fields: Vec<FieldInfo>,
    pub is_spark: bool,
    pub travelable: bool,
}

#[derive(Debug, Clone)]
pub struct VariantInfo {
    pub simple_name: String,
    pub internal_name: String,
    pub fields: Vec<FieldInfo>,
}

impl VariantInfo {
    pub fn is_nullary(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AdtInfo {
    pub simple_name: String,
    pub base_internal_name: String,
    pub variants: Vec<VariantInfo>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("struct `{name}` registered more than once")]
    DuplicateStruct { name: String, span: Span },
    #[error("spark `{name}` registered more than once")]
    DuplicateSpark { name: String, span: Span },
    #[error("data type `{name}` registered more than once")]
    DuplicateAdt { name: String, span: Span },
    #[error("variant `{variant}` registered more than once across data types `{first_owner}` and `{second_owner}`")]
    DuplicateVariant {
        variant: String,
        first_owner: String,
        second_owner: String,
        span: Span,
    },
}

/// Metadata gathered by the C4 prepass, keyed by simple name within the
/// compilation unit. Nested struct/spark/data declarations (inside a class
/// or another declaration) are registered under their `Outer$Inner`
/// internal name but their own simple name as the map key, matching how
/// the pattern lowerer and field-access lowerer look variants up by the
/// bare identifier used at the call site.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub structs: HashMap<String, StructInfo>,
    pub adts: HashMap<String, AdtInfo>,
    /// variant simple name -> (owning ADT simple name, variant simple name),
    /// used by C7 to resolve a bare constructor pattern/call like `Some(x)`.
    pub variants_by_name: HashMap<String, (String, String)>,
}

impl Registry {
    pub fn build(unit: &CompilationUnit) -> Result<Registry, RegistryError> {
        let mut registry = Registry::default();
        let package = unit.module.replace('.', "/");
        for decl in &unit.declarations {
            registry.register_declaration(decl, &Enclosing::Package(&package))?;
        }
        Ok(registry)
    }

    fn register_declaration(&mut self, decl: &Declaration, enclosing: &Enclosing) -> Result<(), RegistryError> {
        match decl {
            Declaration::Struct(s) => self.register_struct(s, enclosing),
            Declaration::Spark(s) => self.register_spark(s, enclosing),
            Declaration::DataAdt(a) => self.register_adt(a, enclosing),
            Declaration::Class(c) | Declaration::Exception(c) => self.register_class_nested(c, enclosing),
            _ => Ok(()),
        }
    }

    fn register_class_nested(&mut self, class: &ClassDecl, enclosing: &Enclosing) -> Result<(), RegistryError> {
        let own_internal = enclosing.join(&class.name);
        let nested_enclosing = Enclosing::Class(&own_internal);
        for nested in &class.nested {
            self.register_declaration(nested, &nested_enclosing)?;
        }
        Ok(())
    }

    fn register_struct(&mut self, decl: &StructDecl, enclosing: &Enclosing) -> Result<(), RegistryError> {
        if self.structs.contains_key(&decl.name) {
            return Err(RegistryError::DuplicateStruct {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
        let info = StructInfo {
            simple_name: decl.name.clone(),
            internal_name: enclosing.join(&decl.name),
            fields: field_infos(&decl.fields),
            is_spark: false,
            travelable: false,
        };
        self.structs.insert(decl.name.clone(), info);
        Ok(())
    }

    fn register_spark(&mut self, decl: &SparkDecl, enclosing: &Enclosing) -> Result<(), RegistryError> {
        if self.structs.contains_key(&decl.name) {
            return Err(RegistryError::DuplicateSpark {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
        let info = StructInfo {
            simple_name: decl.name.clone(),
            internal_name: enclosing.join(&decl.name),
            fields: field_infos(&decl.fields),
            is_spark: true,
            travelable: decl.travelable,
        };
        self.structs.insert(decl.name.clone(), info);
        Ok(())
    }

    fn register_adt(&mut self, decl: &crate::ast::DataAdtDecl, enclosing: &Enclosing) -> Result<(), RegistryError> {
        if self.adts.contains_key(&decl.name) {
            return Err(RegistryError::DuplicateAdt {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
        let base_internal_name = enclosing.join(&decl.name);
        let mut variants = Vec::with_capacity(decl.variants.len());
        for variant in &decl.variants {
            if let Some((existing_owner, _)) = self.variants_by_name.get(&variant.name) {
                return Err(RegistryError::DuplicateVariant {
                    variant: variant.name.clone(),
                    first_owner: existing_owner.clone(),
                    second_owner: decl.name.clone(),
                    span: variant.span,
                });
            }
            self.variants_by_name
                .insert(variant.name.clone(), (decl.name.clone(), variant.name.clone()));
            variants.push(VariantInfo {
                simple_name: variant.name.clone(),
                internal_name: format!("{}${}", base_internal_name, variant.name),
                fields: field_infos(&variant.fields),
            });
        }
        self.adts.insert(
            decl.name.clone(),
            AdtInfo {
                simple_name: decl.name.clone(),
                base_internal_name,
                variants,
            },
        );
        Ok(())
    }

    pub fn lookup_struct(&self, simple_name: &str) -> Option<&StructInfo> {
        self.structs.get(simple_name)
    }

    pub fn lookup_adt(&self, simple_name: &str) -> Option<&AdtInfo> {
        self.adts.get(simple_name)
    }

    /// Resolve a bare constructor name (`Some`, `None`, `Ok`) to its owning
    /// ADT and variant metadata.
    pub fn lookup_variant(&self, variant_simple_name: &str) -> Option<(&AdtInfo, &VariantInfo)> {
        let (adt_name, _) = self.variants_by_name.get(variant_simple_name)?;
        let adt = self.adts.get(adt_name)?;
        let variant = adt.variants.iter().find(|v| v.simple_name == variant_simple_name)?;
        Some((adt, variant))
    }
}

fn field_infos(fields: &[(String, crate::ast::SurfaceType)]) -> Vec<FieldInfo> {
    fields
        .iter()
        .map(|(name, ty)| FieldInfo {
            name: name.clone(),
            surface_type: ty.clone(),
            descriptor: surface_descriptor(ty),
        })
        .collect()
}

/// Where a declaration sits: directly under the module's package (joins
/// with `/`), or nested inside an already-registered class (joins with
/// `$`, JVM's nested-class convention).
enum Enclosing<'a> {
    Package(&'a str),
    Class(&'a str),
}

impl Enclosing<'_> {
    fn join(&self, simple: &str) -> String {
        match self {
            Enclosing::Package(p) if p.is_empty() => simple.to_string(),
            Enclosing::Package(p) => format!("{}/{}", p, simple),
            Enclosing::Class(c) => format!("{}${}", c, simple),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::span::Span;

    fn unit_with(decls: Vec<Declaration>) -> CompilationUnit {
        CompilationUnit {
            module: "app".to_string(),
            uses: Vec::new(),
            declarations: decls,
        }
    }

    fn adt_decl(name: &str, variants: Vec<(&str, Vec<(&str, crate::ast::SurfaceType)>)>) -> crate::ast::DataAdtDecl {
        crate::ast::DataAdtDecl {
            name: name.to_string(),
            visibility: crate::ast::Visibility::Public,
            variants: variants
                .into_iter()
                .map(|(vname, fields)| crate::ast::AdtVariant {
                    name: vname.to_string(),
                    fields,
                    span: Span::synthetic(),
                })
                .collect(),
            span: Span::synthetic(),
        }
    }

    #[test]
    fn registers_adt_variants_with_dollar_internal_names() {
        let int_ty = crate::ast::SurfaceType::Primitive(crate::types::PrimitiveKind::Int);
        let decl = adt_decl("Maybe", vec![("Some", vec![("value", int_ty)]), ("None", vec![])]);
        let unit = unit_with(vec![Declaration::DataAdt(decl)]);
        let registry = Registry::build(&unit).unwrap();

        let adt = registry.lookup_adt("Maybe").unwrap();
        assert_eq!(adt.base_internal_name, "app/Maybe");
        let some = adt.variants.iter().find(|v| v.simple_name == "Some").unwrap();
        assert_eq!(some.internal_name, "app/Maybe$Some");
        assert!(!some.is_nullary());

        let none = adt.variants.iter().find(|v| v.simple_name == "None").unwrap();
        assert!(none.is_nullary());

        let (owner, variant) = registry.lookup_variant("Some").unwrap();
        assert_eq!(owner.simple_name, "Maybe");
        assert_eq!(variant.simple_name, "Some");
    }

    #[test]
    fn duplicate_struct_is_rejected() {
        let decl1 = StructDecl {
            name: "Point".to_string(),
            visibility: crate::ast::Visibility::Public,
            fields: vec![],
            annotations: vec![],
            span: Span::synthetic(),
        };
        let decl2 = decl1.clone();
        let unit = unit_with(vec![Declaration::Struct(decl1), Declaration::Struct(decl2)]);
        let err = Registry::build(&unit).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateStruct { .. }));
    }

    #[test]
    fn nested_struct_inside_class_gets_outer_dollar_name() {
        let nested = StructDecl {
            name: "Inner".to_string(),
            visibility: crate::ast::Visibility::Public,
            fields: vec![],
            annotations: vec![],
            span: Span::synthetic(),
        };
        let class = ClassDecl {
            name: "Outer".to_string(),
            visibility: crate::ast::Visibility::Public,
            type_params: vec![],
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            nested: vec![Declaration::Struct(nested)],
            annotations: vec![],
            span: Span::synthetic(),
        };
        let unit = unit_with(vec![Declaration::Class(class)]);
        let registry = Registry::build(&unit).unwrap();
        let inner = registry.lookup_struct("Inner").unwrap();
        assert_eq!(inner.internal_name, "app/Outer$Inner");
    }
}
