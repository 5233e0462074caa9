use warden_core::WardenError;

/// The server's own API major/minor version. A client is compatible when
/// its major matches and its minor is no newer than the server's.
pub const SERVER_VERSION: ApiVersion = ApiVersion { major: 1, minor: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    fn compatible_with(&self, server: ApiVersion) -> bool {
        self.major == server.major && self.minor <= server.minor
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `checkAPIVersion()`: a no-op on success, `ApiMismatch` otherwise.
pub fn check_api_version(client: ApiVersion) -> Result<(), WardenError> {
    if client.compatible_with(SERVER_VERSION) {
        Ok(())
    } else {
        Err(WardenError::ApiMismatch {
            client: client.to_string(),
            server: SERVER_VERSION.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_older_minor_is_compatible() {
        assert!(check_api_version(ApiVersion::new(1, 0)).is_ok());
    }

    #[test]
    fn newer_minor_is_rejected() {
        assert!(check_api_version(ApiVersion::new(1, 5)).is_err());
    }

    #[test]
    fn different_major_is_rejected() {
        let err = check_api_version(ApiVersion::new(2, 0)).unwrap_err();
        assert!(matches!(err, WardenError::ApiMismatch { .. }));
    }
}
