//! Infrastructure provider credential templating
//!
//! Provider release manifests ship with `${...}` placeholders for credential
//! material. This module maps a provider id plus the supplied secret values
//! to the literal rewrites performed on the downloaded manifest before it is
//! applied. Pure mapping; no storage or network access.

/// A single placeholder rewrite applied to a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    /// Literal token to search for (e.g. `${AWS_B64ENCODED_CREDENTIALS}`)
    pub placeholder: String,
    /// Value every occurrence is replaced with
    pub replacement: String,
}

impl SubstitutionRule {
    /// Create a rule rewriting `placeholder` to `replacement`
    pub fn new(placeholder: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            replacement: replacement.into(),
        }
    }
}

/// Build the substitution rules for an infrastructure provider.
///
/// Providers without a known placeholder mapping, and requests without a
/// secret, produce no rules; the manifest is applied unmodified.
///
/// vsphere emits its two rules only when BOTH username and password are
/// non-empty. Partial credentials silently skip substitution instead of
/// erroring; the tests pin this behavior down.
pub fn substitutions_for(
    provider: &str,
    secret: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Vec<SubstitutionRule> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match provider {
        "aws" => vec![SubstitutionRule::new("${AWS_B64ENCODED_CREDENTIALS}", secret)],
        "packet" => vec![SubstitutionRule::new("${PACKET_API_KEY}", secret)],
        "gcp" => vec![SubstitutionRule::new("${GCP_B64ENCODED_CREDENTIALS}", secret)],
        "vsphere" => {
            let username = username.filter(|u| !u.is_empty());
            let password = password.filter(|p| !p.is_empty());
            match (username, password) {
                (Some(username), Some(password)) => vec![
                    SubstitutionRule::new("${VSPHERE_USERNAME}", username),
                    SubstitutionRule::new("${VSPHERE_PASSWORD}", password),
                ],
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Apply substitution rules to a manifest buffer, in rule order.
///
/// Every occurrence of each placeholder is replaced across the whole buffer.
/// Later rules see the output of earlier ones, so ordering matters when
/// placeholders could overlap.
pub fn apply_substitutions(content: &str, rules: &[SubstitutionRule]) -> String {
    let mut result = content.to_string();
    for rule in rules {
        result = result.replace(&rule.placeholder, &rule.replacement);
    }
    result
}
