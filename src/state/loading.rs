// Loading state for async data.
// Idle until the first request, then Loading and finally Ready or Errored.

/// Lifecycle of a piece of remotely loaded data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Errored(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Errored(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let idle: LoadState<u32> = LoadState::default();
        assert_eq!(idle, LoadState::Idle);
        assert!(idle.data().is_none());

        assert!(LoadState::<u32>::Loading.is_loading());

        let ready = LoadState::Ready(3);
        assert!(ready.is_ready());
        assert_eq!(ready.data(), Some(&3));

        let errored: LoadState<u32> = LoadState::Errored("boom".into());
        assert_eq!(errored.error(), Some("boom"));
        assert!(errored.data().is_none());
    }
}
