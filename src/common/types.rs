use rand::{Rng, distributions::Alphanumeric};

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Platform snowflake ids are plain integers; each kind gets its own type.
macro_rules! snowflake_id {
  ($(#[$doc:meta])* $name:ident) => {
    $(#[$doc])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub u64);

    impl From<u64> for $name {
      fn from(id: u64) -> Self {
        Self(id)
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

snowflake_id!(
  /// A member of the chat platform.
  UserId
);
snowflake_id!(
  /// A voice channel.
  ChannelId
);

/// Random per-join id; late messages carrying an old one are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
  const LEN: usize = 12;

  /// Lower-case letters and digits only.
  pub fn generate() -> Self {
    let id = rand::thread_rng()
      .sample_iter(&Alphanumeric)
      .map(char::from)
      .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
      .take(Self::LEN)
      .collect();
    Self(id)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for SessionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_session_id_shape() {
    let id = SessionId::generate();
    assert_eq!(id.as_str().len(), 12);
    assert!(
      id.as_str()
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    );
    assert_ne!(id, SessionId::generate());
  }

  #[test]
  fn test_snowflakes_serialize_as_numbers() {
    assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
    assert_eq!(ChannelId::from(7).to_string(), "7");
  }
}
