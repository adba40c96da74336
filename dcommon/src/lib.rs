//! Shared aliases, identifiers and generation settings used across dashmind crates.
//!
//! ```rust
//! use dcommon::{GenerationOptions, SessionId, TraceId};
//!
//! let session = SessionId::from("report-1");
//! let trace = TraceId::new("trace-1");
//! let options = GenerationOptions::default().with_temperature(0.1).with_max_tokens(2048);
//!
//! assert_eq!(session.as_str(), "report-1");
//! assert_eq!(trace.to_string(), "trace-1");
//! assert!(options.validate().is_ok());
//! ```

pub mod future {
    //! Boxed future alias for object-safe async traits.
    //!
    //! ```rust
    //! use dcommon::BoxFuture;
    //!
    //! fn word_count<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.split_whitespace().count() })
    //! }
    //!
    //! let _future = word_count("top pages last week");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Session/trace identifiers and free-form metadata.

    use std::collections::HashMap;

    pub type MetadataMap = HashMap<String, String>;

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(
        /// Identifies one chat or report session.
        SessionId
    );

    string_id!(
        /// Correlates log and metric events that belong to one request.
        TraceId
    );
}

pub mod model {
    //! Sampling settings shared by every backend profile.
    //!
    //! ```rust
    //! use dcommon::GenerationOptions;
    //!
    //! let defaults = GenerationOptions::default().with_temperature(0.1).with_max_tokens(2048);
    //! let overrides = GenerationOptions::default().with_max_tokens(512);
    //!
    //! let merged = overrides.or(defaults);
    //! assert_eq!(merged.temperature, Some(0.1));
    //! assert_eq!(merged.max_tokens, Some(512));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }

        /// Fills unset fields from `fallback`.
        pub fn or(self, fallback: GenerationOptions) -> Self {
            Self {
                temperature: self.temperature.or(fallback.temperature),
                max_tokens: self.max_tokens.or(fallback.max_tokens),
            }
        }

        pub fn validate(&self) -> Result<(), String> {
            if self.max_tokens == Some(0) {
                return Err("max_tokens must be greater than zero".to_string());
            }

            if let Some(temperature) = self.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    return Err("temperature must be in the inclusive range 0.0..=2.0".to_string());
                }
            }

            Ok(())
        }
    }
}

pub mod registry {
    //! Insertion-ordered keyed registry.
    //!
    //! Iteration follows registration order so anything serialized from a
    //! registry stays stable between runs.
    //!
    //! ```rust
    //! use dcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("get_website_stats", 1_u32);
    //! registry.insert("get_page_views", 2_u32);
    //!
    //! assert_eq!(registry.values().copied().collect::<Vec<_>>(), vec![1, 2]);
    //! ```

    use std::borrow::Borrow;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        entries: Vec<(K, V)>,
    }

    impl<K, V> Default for Registry<K, V> {
        fn default() -> Self {
            Self {
                entries: Vec::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq,
    {
        pub fn new() -> Self {
            Self::default()
        }

        /// Replaces an existing entry in place, keeping its position.
        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            match self.position(&key) {
                Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
                None => {
                    self.entries.push((key, value));
                    None
                }
            }
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + ?Sized,
        {
            self.position(key).map(|index| &self.entries[index].1)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + ?Sized,
        {
            self.position(key)
                .map(|index| self.entries.remove(index).1)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + ?Sized,
        {
            self.position(key).is_some()
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.entries.iter().map(|(_, value)| value)
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }

        fn position<Q>(&self, key: &Q) -> Option<usize>
        where
            K: Borrow<Q>,
            Q: Eq + ?Sized,
        {
            self.entries
                .iter()
                .position(|(candidate, _)| candidate.borrow() == key)
        }
    }
}

pub use context::{MetadataMap, SessionId, TraceId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::{GenerationOptions, Registry, SessionId, TraceId};

    #[test]
    fn string_ids_display_their_value() {
        let session = SessionId::new("chat-7");
        let trace = TraceId::from("trace-7".to_string());

        assert_eq!(session.to_string(), "chat-7");
        assert_eq!(trace.as_str(), "trace-7");
    }

    #[test]
    fn generation_options_validate_bounds() {
        assert!(GenerationOptions::default().validate().is_ok());
        assert!(
            GenerationOptions::default()
                .with_max_tokens(0)
                .validate()
                .is_err()
        );
        assert!(
            GenerationOptions::default()
                .with_temperature(2.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn generation_options_or_prefers_own_values() {
        let base = GenerationOptions::default()
            .with_temperature(0.1)
            .with_max_tokens(2048);
        let merged = GenerationOptions::default().with_temperature(0.7).or(base);

        assert_eq!(merged.temperature, Some(0.7));
        assert_eq!(merged.max_tokens, Some(2048));
    }

    #[test]
    fn registry_keeps_insertion_order_and_replaces_in_place() {
        let mut registry = Registry::new();
        registry.insert("b".to_string(), 1_u32);
        registry.insert("a".to_string(), 2_u32);
        let previous = registry.insert("b".to_string(), 3_u32);

        assert_eq!(previous, Some(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.values().copied().collect::<Vec<_>>(), vec![3, 2]);

        assert_eq!(registry.remove("b"), Some(3));
        assert!(!registry.contains_key("b"));
        assert_eq!(registry.get("a"), Some(&2));
    }
}
