/// Replace `${ENV_VAR}` and `${ENV_VAR:-default}` placeholders in config text.
///
/// Unresolvable variables without a default are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated, emit the remainder literally.
            result.push_str(&rest[start..]);
            return result;
        };
        let body = &after[..end];
        let (name, default) = match body.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        if name.is_empty() {
            result.push_str(&rest[start..start + 2 + end + 1]);
        } else {
            match (lookup(name).filter(|v| !v.is_empty()), default) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => result.push_str(&rest[start..start + 2 + end + 1]),
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SCRAPBOOK_TEST_URL" => Some("https://archive.example.org".into()),
            "SCRAPBOOK_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("base_url = \"${SCRAPBOOK_TEST_URL}\"", lookup),
            "base_url = \"https://archive.example.org\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${SCRAPBOOK_NONEXISTENT_XYZ}", lookup),
            "${SCRAPBOOK_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(
            substitute_env_with("limit = ${SCRAPBOOK_LIMIT:-4}", lookup),
            "limit = 4"
        );
        assert_eq!(substitute_env_with("${SCRAPBOOK_EMPTY:-x}", lookup), "x");
        assert_eq!(
            substitute_env_with("${SCRAPBOOK_TEST_URL:-unused}", lookup),
            "https://archive.example.org"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${OPEN", lookup), "a ${OPEN");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
