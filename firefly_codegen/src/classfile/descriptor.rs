//! Method/field descriptor string assembly and the reflected-method
//! descriptor parsing the method resolver needs to classify widening
//! conversions (byte/short/char are reflection-only categories; the
//! back end never materializes Firefly values in those categories).

/// Build a method descriptor string from parameter descriptors and a
/// return descriptor (`"V"` for void).
pub fn method_descriptor(params: &[&str], ret: &str) -> String {
    let mut d = String::from("(");
    for p in params {
        d.push_str(p);
    }
    d.push(')');
    d.push_str(ret);
    d
}

/// Split a method descriptor `"(I)Ljava/lang/String;"` into its parameter
/// descriptor list and return descriptor.
pub fn parse_method_descriptor(descriptor: &str) -> Option<(Vec<String>, String)> {
    let inner_end = descriptor.find(')')?;
    if !descriptor.starts_with('(') {
        return None;
    }
    let params_str = &descriptor[1..inner_end];
    let ret = descriptor[inner_end + 1..].to_string();
    let mut params = Vec::new();
    let mut chars = params_str.chars().peekable();
    while chars.peek().is_some() {
        params.push(consume_one_descriptor(&mut chars));
    }
    Some((params, ret))
}

fn consume_one_descriptor(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('[') => out.push('['),
            Some('L') => {
                out.push('L');
                for c in chars.by_ref() {
                    out.push(c);
                    if c == ';' {
                        break;
                    }
                }
                break;
            }
            Some(c) => {
                out.push(c);
                break;
            }
            None => break,
        }
    }
    out
}

/// True if `descriptor` names an array type.
pub fn is_array_descriptor(descriptor: &str) -> bool {
    descriptor.starts_with('[')
}

/// The element descriptor of an array descriptor, e.g. `"[I"` → `"I"`.
pub fn array_element_descriptor(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('[')
}

/// Internal class name carried by an object descriptor, e.g.
/// `"Ljava/lang/String;"` → `"java/lang/String"`.
pub fn class_name_from_descriptor(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('L').and_then(|s| s.strip_suffix(';'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_simple_descriptor() {
        assert_eq!(method_descriptor(&["I", "J"], "Z"), "(IJ)Z");
        assert_eq!(method_descriptor(&[], "V"), "()V");
    }

    #[test]
    fn parses_round_trip() {
        let (params, ret) = parse_method_descriptor("(ILjava/lang/String;[I)Z").unwrap();
        assert_eq!(params, vec!["I", "Ljava/lang/String;", "[I"]);
        assert_eq!(ret, "Z");
    }

    #[test]
    fn extracts_class_name() {
        assert_eq!(
            class_name_from_descriptor("Ljava/lang/String;"),
            Some("java/lang/String")
        );
        assert_eq!(class_name_from_descriptor("I"), None);
    }
}
