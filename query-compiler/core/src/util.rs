use heck::ToSnakeCase;

/// Snake-cases a GraphQL field name for schema lookup.
pub(crate) fn to_snake(name: &str) -> String {
    name.to_snake_case()
}

/// Strips the singular-lookup suffix (`usersByID` → `users`) in either its
/// raw or snake-cased form.
pub(crate) fn strip_by_id<'a>(name: &'a str) -> &'a str {
    name.strip_suffix("ByID")
        .or_else(|| name.strip_suffix("_by_id"))
        .unwrap_or(name)
}

/// True when an English noun reads as singular. Suffix rules only; enough
/// to separate `user` from `users` and `story` from `stories`.
pub(crate) fn is_singular(word: &str) -> bool {
    singular_of(word) == word
}

pub(crate) fn singular_of(word: &str) -> String {
    if word.len() > 3 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if word.len() > suffix.len() {
            if let Some(stem) = word.strip_suffix(suffix) {
                return format!("{stem}{}", &suffix[..suffix.len() - 2]);
            }
        }
    }
    if word.len() > 1
        && word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}
