//! Keeps configured credentials out of logs.
//!
//! The processor reads an OAuth client secret (and, depending on the deployment, other
//! credentials) from the environment and logs its configuration at startup. Wrapping the value
//! in [`Secret`] makes that logging safe: every formatting path renders `****`, and getting at
//! the real value requires an explicit, greppable [`Secret::reveal`] call.
use std::fmt;

/// A value that renders as `****` in all formatting contexts.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// The wrapped value. Hand the result straight to its consumer (a token request body, a
    /// connection string) rather than storing it somewhere it might be printed.
    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + Default> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn formatting_never_discloses_the_value() {
        let secret: Secret<String> = "hunter2".to_string().into();
        assert_eq!(format!("{secret}"), "****");
        assert_eq!(format!("{secret:?}"), "****");
        assert_eq!(secret.reveal(), "hunter2");
    }
}
