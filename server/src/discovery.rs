//! Host name advertisement on the local network.

/// Announces the device so clients can reach it by name.
pub trait Advertiser {
    fn advertise(&mut self, hostname: &str, port: u16) -> eyre::Result<()>;
}

/// Logs the advertisement instead of speaking a discovery protocol.
#[derive(Debug, Default)]
pub struct LogAdvertiser {
    advertised: Option<String>,
}

impl LogAdvertiser {
    pub fn advertised(&self) -> Option<&str> {
        self.advertised.as_deref()
    }
}

impl Advertiser for LogAdvertiser {
    fn advertise(&mut self, hostname: &str, port: u16) -> eyre::Result<()> {
        if hostname.is_empty() {
            eyre::bail!("empty host name");
        }
        let name = format!("{hostname}.local");
        tracing::info!(%name, port, "advertising host");
        self.advertised = Some(name);
        Ok(())
    }
}

/// Start advertising. Failure is logged and otherwise ignored.
pub fn start(advertiser: &mut impl Advertiser, hostname: &str, port: u16) {
    if let Err(e) = advertiser.advertise(hostname, port) {
        tracing::warn!("advertising {hostname:?} failed: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_local_name() {
        let mut advertiser = LogAdvertiser::default();
        start(&mut advertiser, "runmod", 80);
        assert_eq!(advertiser.advertised(), Some("runmod.local"));
    }

    #[test]
    fn failure_is_not_fatal() {
        let mut advertiser = LogAdvertiser::default();
        start(&mut advertiser, "", 80);
        assert_eq!(advertiser.advertised(), None);
    }
}
