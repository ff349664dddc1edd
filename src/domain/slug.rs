/// URL-safe form of a title: lowercase alphanumerics separated by single dashes
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rock & Roll!! "), "rock-roll");
        assert_eq!(slugify("AC/DC -- Back in Black"), "ac-dc-back-in-black");
        assert_eq!(slugify("Déjà Vu"), "déjà-vu");
        assert_eq!(slugify("!!!"), "");
    }
}
