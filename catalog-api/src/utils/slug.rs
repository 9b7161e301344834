use std::collections::HashSet;

/// URL slug: lowercase ASCII alphanumerics separated by single dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// First free slug among `base`, `base-1`, `base-2`, ...
///
/// `taken` holds the existing slugs that start with `base`.
pub fn pick_unique<S: AsRef<str>>(base: &str, taken: &[S]) -> String {
    let taken: HashSet<&str> = taken.iter().map(|s| s.as_ref()).collect();

    if !taken.contains(base) {
        return base.to_string();
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Ball Valve -- 2\" (Brass) "), "ball-valve-2-brass");
        assert_eq!(slugify("Émaillé"), "maill");
        assert_eq!(slugify("!!!"), "item");
    }

    #[test]
    fn test_pick_unique() {
        let none: [&str; 0] = [];
        assert_eq!(pick_unique("pump", &none), "pump");
        assert_eq!(pick_unique("pump", &["pump"]), "pump-1");
        assert_eq!(pick_unique("pump", &["pump", "pump-1", "pump-3"]), "pump-2");
    }
}
