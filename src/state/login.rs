/// Cosmetic access-code gate in front of the prompt box. Comparing a string
/// held in the same process is not a security control.
#[derive(Debug, Clone, Default)]
pub struct LoginGate {
    access_code: Option<String>,
    authorized: bool,
}

impl LoginGate {
    /// With no code configured the gate starts open.
    pub fn new(access_code: Option<String>) -> Self {
        let access_code = access_code.filter(|code| !code.is_empty());
        let authorized = access_code.is_none();
        Self {
            access_code,
            authorized,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn authorize(&mut self, secret: &str) -> bool {
        if let Some(code) = &self.access_code {
            self.authorized = secret.trim() == code;
        }
        self.authorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_without_code() {
        let mut gate = LoginGate::new(None);
        assert!(gate.is_authorized());
        assert!(gate.authorize("anything"));
    }

    #[test]
    fn test_requires_matching_code() {
        let mut gate = LoginGate::new(Some("letmein".to_string()));
        assert!(!gate.is_authorized());
        assert!(!gate.authorize("nope"));
        assert!(gate.authorize(" letmein "));
        assert!(gate.is_authorized());
    }
}
