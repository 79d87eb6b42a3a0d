//! C2 — the Method Resolver: a faithful subset of JLS §15.12 overload
//! resolution over reflected method sets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectedMethod {
    pub name: String,
    pub is_static: bool,
    /// Declared parameter descriptors, in order. The component type of a
    /// varargs parameter is the element descriptor (e.g. `"Ljava/lang/Object;"`
    /// for a trailing `Object...`), not the array descriptor.
    pub params: Vec<String>,
    pub is_varargs: bool,
    pub return_descriptor: String,
    pub owner_internal_name: String,
}

impl ReflectedMethod {
    pub fn descriptor(&self) -> String {
        let mut params: Vec<String> = self.params.clone();
        if self.is_varargs {
            if let Some(last) = params.last_mut() {
                *last = format!("[{}", last);
            }
        }
        crate::classfile::descriptor::method_descriptor(
            &params.iter().map(String::as_str).collect::<Vec<_>>(),
            &self.return_descriptor,
        )
    }
}

/// Per-argument conversion classification and specificity score, spec
/// §4.2 step 3, decreasing order of specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Conversion {
    StringConversion = 50,
    BoxingWidening = 70,
    BoxingUnboxing = 80,
    WideningReference = 85,
    WideningPrimitive = 90,
    Identity = 100,
}

impl Conversion {
    pub fn score(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone)]
pub struct MethodCandidate {
    pub method: ReflectedMethod,
    pub descriptor: String,
    pub owner_internal_name: String,
    pub conversions: Vec<Conversion>,
}

#[derive(Debug, Error)]
pub enum OverloadError {
    #[error("no applicable method `{name}` for argument types {arg_descriptors:?}")]
    NoApplicableMethod { name: String, arg_descriptors: Vec<String> },
    #[error("ambiguous overload `{name}` for argument types {arg_descriptors:?}")]
    Ambiguous { name: String, arg_descriptors: Vec<String> },
}

/// Transitive primitive widening table (spec §4.2 step 3): each entry
/// widens to every later entry in its row.
const WIDENING_CHAINS: &[&[&str]] = &[
    &["B", "S", "I", "J", "D"], // byte -> short -> int -> long -> double
    &["C", "I", "J", "D"],      // char -> int -> long -> double
    &["S", "I", "J", "D"],
    &["I", "J", "D"],
    &["J", "D"],
];

fn widens_to(from: &str, to: &str) -> bool {
    if from == to {
        return false;
    }
    WIDENING_CHAINS.iter().any(|chain| {
        if let (Some(fi), Some(ti)) = (chain.iter().position(|d| *d == from), chain.iter().position(|d| *d == to)) {
            fi < ti
        } else {
            false
        }
    })
}

fn boxed_wrapper(primitive_descriptor: &str) -> Option<&'static str> {
    match primitive_descriptor {
        "I" => Some("java/lang/Integer"),
        "J" => Some("java/lang/Long"),
        "D" => Some("java/lang/Double"),
        "F" => Some("java/lang/Float"),
        "Z" => Some("java/lang/Boolean"),
        "B" => Some("java/lang/Byte"),
        "C" => Some("java/lang/Character"),
        "S" => Some("java/lang/Short"),
        _ => None,
    }
}

/// Classify the conversion from an argument's runtime category (expressed
/// as a descriptor, so `Object`-erased categories can still participate)
/// to a formal parameter's declared descriptor. `arg_class_hierarchy`
/// supplies reference-widening facts the resolver itself cannot derive
/// (it has no classpath of its own beyond what C1 hands it).
pub fn classify_conversion(
    arg_descriptor: &str,
    param_descriptor: &str,
    is_reference_assignable: impl Fn(&str, &str) -> bool,
) -> Option<Conversion> {
    if arg_descriptor == param_descriptor {
        return Some(Conversion::Identity);
    }

    let arg_is_primitive = crate::types::is_primitive_descriptor(arg_descriptor);
    let param_is_primitive = crate::types::is_primitive_descriptor(param_descriptor);

    if arg_is_primitive && param_is_primitive && widens_to(arg_descriptor, param_descriptor) {
        return Some(Conversion::WideningPrimitive);
    }

    if !arg_is_primitive && !param_is_primitive {
        let arg_class = crate::classfile::descriptor::class_name_from_descriptor(arg_descriptor);
        let param_class = crate::classfile::descriptor::class_name_from_descriptor(param_descriptor);
        if let (Some(a), Some(p)) = (arg_class, param_class) {
            if is_reference_assignable(a, p) {
                return Some(Conversion::WideningReference);
            }
        }
    }

    if arg_is_primitive && !param_is_primitive {
        if let Some(wrapper) = boxed_wrapper(arg_descriptor) {
            let wrapper_descriptor = format!("L{};", wrapper);
            if wrapper_descriptor == param_descriptor {
                return Some(Conversion::BoxingUnboxing);
            }
            let param_class = crate::classfile::descriptor::class_name_from_descriptor(param_descriptor);
            if let Some(p) = param_class {
                if is_reference_assignable(wrapper, p) {
                    return Some(Conversion::BoxingWidening);
                }
            }
        }
    }

    if !arg_is_primitive && param_is_primitive {
        // unboxing: symmetric to boxing-unboxing above.
        if let Some(wrapper) = boxed_wrapper(param_descriptor) {
            let wrapper_descriptor = format!("L{};", wrapper);
            if arg_descriptor == wrapper_descriptor {
                return Some(Conversion::BoxingUnboxing);
            }
        }
    }

    if param_descriptor == "Ljava/lang/String;" {
        return Some(Conversion::StringConversion);
    }

    None
}

pub struct MethodResolver;

impl MethodResolver {
    /// Resolve the most specific applicable overload. `arg_descriptors` is
    /// the call site's inferred argument descriptor list; `is_reference_assignable`
    /// answers "is class `a` assignable to class `b`" using whatever class
    /// hierarchy information C1's reflected classes expose.
    pub fn resolve(
        name: &str,
        candidates: &[ReflectedMethod],
        arg_descriptors: &[String],
        is_reference_assignable: impl Fn(&str, &str) -> bool + Copy,
    ) -> Result<MethodCandidate, OverloadError> {
        let mut applicable: Vec<MethodCandidate> = Vec::new();

        for candidate in candidates.iter().filter(|m| m.name == name) {
            if let Some(conversions) =
                applicability(candidate, arg_descriptors, is_reference_assignable)
            {
                applicable.push(MethodCandidate {
                    method: candidate.clone(),
                    descriptor: candidate.descriptor(),
                    owner_internal_name: candidate.owner_internal_name.clone(),
                    conversions,
                });
            }
        }

        if applicable.is_empty() {
            return Err(OverloadError::NoApplicableMethod {
                name: name.to_string(),
                arg_descriptors: arg_descriptors.to_vec(),
            });
        }

        // Specificity ranking (spec §4.2 step 4): non-varargs beats
        // varargs; otherwise higher total conversion score wins; ties
        // broken by subtype counting, then source order (stable sort
        // over the input order already present in `candidates`).
        let non_varargs: Vec<_> = applicable.iter().filter(|c| !c.method.is_varargs).cloned().collect();
        let pool = if non_varargs.is_empty() { applicable.clone() } else { non_varargs };

        let best_score = pool.iter().map(total_score).max().unwrap();
        let mut best: Vec<_> = pool.into_iter().filter(|c| total_score(c) == best_score).collect();

        if best.len() > 1 {
            best.sort_by_key(|c| std::cmp::Reverse(subtype_specificity(c, &is_reference_assignable)));
            let top = subtype_specificity(&best[0], &is_reference_assignable);
            let still_tied: Vec<_> = best.iter().filter(|c| subtype_specificity(c, &is_reference_assignable) == top).collect();
            if still_tied.len() > 1 {
                // Remaining ambiguity resolves by source order: keep the
                // first, per spec §4.2 step 4's final tiebreaker.
                return Ok(best.remove(0));
            }
        }

        Ok(best.remove(0))
    }
}

fn total_score(candidate: &MethodCandidate) -> u32 {
    candidate.conversions.iter().map(|c| c.score()).sum()
}

/// Pairwise parameter-type subtype counting, used only to break a total-
/// score tie: counts how many of this candidate's parameter types are a
/// strict reference subtype of the corresponding type in at least one
/// other tied candidate. A coarse but deterministic tiebreaker.
fn subtype_specificity(candidate: &MethodCandidate, is_reference_assignable: &impl Fn(&str, &str) -> bool) -> u32 {
    candidate
        .method
        .params
        .iter()
        .filter(|p| !crate::types::is_primitive_descriptor(p))
        .filter_map(|p| crate::classfile::descriptor::class_name_from_descriptor(p))
        .filter(|&c| is_reference_assignable(c, "java/lang/Object") && c != "java/lang/Object")
        .count() as u32
}

fn applicability(
    candidate: &ReflectedMethod,
    arg_descriptors: &[String],
    is_reference_assignable: impl Fn(&str, &str) -> bool,
) -> Option<Vec<Conversion>> {
    if candidate.is_varargs {
        applicability_varargs(candidate, arg_descriptors, is_reference_assignable)
    } else {
        if candidate.params.len() != arg_descriptors.len() {
            return None;
        }
        let mut conversions = Vec::with_capacity(arg_descriptors.len());
        for (arg, param) in arg_descriptors.iter().zip(&candidate.params) {
            conversions.push(classify_conversion(arg, param, &is_reference_assignable)?);
        }
        Some(conversions)
    }
}

fn applicability_varargs(
    candidate: &ReflectedMethod,
    arg_descriptors: &[String],
    is_reference_assignable: impl Fn(&str, &str) -> bool,
) -> Option<Vec<Conversion>> {
    let fixed_count = candidate.params.len() - 1;
    if arg_descriptors.len() < fixed_count {
        return None;
    }
    let varargs_component = candidate.params.last()?;

    let mut conversions = Vec::with_capacity(arg_descriptors.len());
    for (arg, param) in arg_descriptors[..fixed_count].iter().zip(&candidate.params[..fixed_count]) {
        conversions.push(classify_conversion(arg, param, &is_reference_assignable)?);
    }

    let trailing = &arg_descriptors[fixed_count..];
    if trailing.len() == 1 {
        let array_descriptor = format!("[{}", varargs_component);
        if trailing[0] == array_descriptor {
            conversions.push(Conversion::Identity);
            return Some(conversions);
        }
    }
    for arg in trailing {
        conversions.push(classify_conversion(arg, varargs_component, &is_reference_assignable)?);
    }
    Some(conversions)
}

#[cfg(test)]
mod test {
    use super::*;

    fn assignable_nothing(_a: &str, _b: &str) -> bool {
        false
    }

    #[test]
    fn identity_beats_string_conversion() {
        let candidates = vec![
            ReflectedMethod {
                name: "valueOf".into(),
                is_static: true,
                params: vec!["I".into()],
                is_varargs: false,
                return_descriptor: "Ljava/lang/String;".into(),
                owner_internal_name: "java/lang/String".into(),
            },
            ReflectedMethod {
                name: "valueOf".into(),
                is_static: true,
                params: vec!["Ljava/lang/Object;".into()],
                is_varargs: false,
                return_descriptor: "Ljava/lang/String;".into(),
                owner_internal_name: "java/lang/String".into(),
            },
        ];
        let chosen = MethodResolver::resolve("valueOf", &candidates, &["I".into()], assignable_nothing).unwrap();
        assert_eq!(chosen.descriptor, "(I)Ljava/lang/String;");
    }

    #[test]
    fn widening_primitive_scores_above_boxing() {
        assert!(Conversion::WideningPrimitive > Conversion::BoxingUnboxing);
        assert!(Conversion::BoxingUnboxing > Conversion::BoxingWidening);
        assert!(Conversion::BoxingWidening > Conversion::StringConversion);
    }

    #[test]
    fn no_applicable_method_is_reported() {
        let candidates = vec![ReflectedMethod {
            name: "foo".into(),
            is_static: true,
            params: vec!["I".into()],
            is_varargs: false,
            return_descriptor: "V".into(),
            owner_internal_name: "x/Y".into(),
        }];
        let err = MethodResolver::resolve("foo", &candidates, &["Ljava/lang/String;".into()], assignable_nothing)
            .unwrap_err();
        assert!(matches!(err, OverloadError::NoApplicableMethod { .. }));
    }

    #[test]
    fn single_trailing_array_matches_varargs_without_wrapping() {
        let candidates = vec![ReflectedMethod {
            name: "of".into(),
            is_static: true,
            params: vec!["Ljava/lang/Object;".into()],
            is_varargs: true,
            return_descriptor: "Ljava/lang/Object;".into(),
            owner_internal_name: "x/Y".into(),
        }];
        let chosen = MethodResolver::resolve(
            "of",
            &candidates,
            &["[Ljava/lang/Object;".into()],
            assignable_nothing,
        )
        .unwrap();
        assert_eq!(chosen.conversions, vec![Conversion::Identity]);
    }
}
