//! Fetch-once robots.txt handling (`§4.5`): fetched at most once per
//! scan and consulted for every URL considered thereafter.

/// Parsed `Disallow` rules for the wildcard (`*`) user-agent group. Real
/// robots.txt files have per-agent groups; this crate only honors the
/// wildcard group, matching its own `userAgent` configuration value.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    disallow: Vec<String>,
}

impl RobotsTxt {
    #[must_use]
    pub fn allow_all() -> Self {
        Self { disallow: Vec::new() }
    }

    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut disallow = Vec::new();
        let mut in_wildcard_group = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => in_wildcard_group = value == "*",
                "disallow" if in_wildcard_group && !value.is_empty() => disallow.push(value.to_string()),
                _ => {}
            }
        }

        Self { disallow }
    }

    /// `true` if `path` (the URL path, including leading `/`) is allowed.
    /// Matches by prefix, the common and simplest robots.txt semantics.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallow.iter().any(|rule| path.starts_with(rule.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_everything_with_no_rules() {
        let robots = RobotsTxt::allow_all();
        assert!(robots.is_allowed("/private/anything"));
    }

    #[test]
    fn disallows_matching_prefixes_in_the_wildcard_group() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /admin\nDisallow: /private/\n");
        assert!(!robots.is_allowed("/admin/settings"));
        assert!(!robots.is_allowed("/private/notes"));
        assert!(robots.is_allowed("/public/index.html"));
    }

    #[test]
    fn ignores_rules_outside_the_wildcard_group() {
        let robots = RobotsTxt::parse("User-agent: Googlebot\nDisallow: /\nUser-agent: *\nDisallow: /only-this\n");
        assert!(robots.is_allowed("/anything"));
        assert!(!robots.is_allowed("/only-this/path"));
    }
}
