//! The install state machine: HTTP request events in, flash actions out.

use std::time::{Duration, Instant};

use crate::error::InstallError;
use crate::flash::{Flash, FlashRegion};
use crate::planner::erase_plan;
use crate::restart::Restart;
use crate::{RESTART_DELAY, SIGNATURE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// No install request in progress.
    Idle,
    /// Install requested, waiting for the content length.
    Armed,
    /// Erase plan executed, nothing written yet.
    Erasing,
    /// At least one fragment written.
    Writing,
    /// Body complete, restart scheduled.
    Complete,
    /// Signature cleared, restart scheduled.
    Uninstalling,
}

/// Settings fixed at startup.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub restart_delay: Duration,
    /// Discard a session still waiting for its content length after this long.
    pub stale_after: Option<Duration>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            restart_delay: RESTART_DELAY,
            stale_after: None,
        }
    }
}

/// Per-request install context, owned by the request handler.
///
/// Each session carries the generation it was created with; once a newer
/// session starts, or an uninstall cancels it, its events are dropped.
#[derive(Debug)]
pub struct InstallSession {
    id: u64,
    region: FlashRegion,
    write_position: u32,
    erase_length: Option<u32>,
    started: Instant,
}

impl InstallSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn region(&self) -> &FlashRegion {
        &self.region
    }

    pub fn write_position(&self) -> u32 {
        self.write_position
    }

    pub fn erase_length(&self) -> Option<u32> {
        self.erase_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    Written { position: u32 },
    /// No erase target (content length unknown, or session no longer live).
    Dropped,
}

/// Owns the flash region and drives it from install and uninstall events.
pub struct Installer<F, R> {
    flash: F,
    restart: R,
    config: InstallConfig,
    state: InstallState,
    active: Option<u64>,
    generation: u64,
    restart_scheduled: bool,
}

impl<F, R> Installer<F, R>
where
    F: Flash,
    R: Restart,
{
    pub fn new(flash: F, restart: R, config: InstallConfig) -> Self {
        Self {
            flash,
            restart,
            config,
            state: InstallState::Idle,
            active: None,
            generation: 0,
            restart_scheduled: false,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn restart(&self) -> &R {
        &self.restart
    }

    pub fn restart_scheduled(&self) -> bool {
        self.restart_scheduled
    }

    /// Arm a new session against the flash region. Any previous session is
    /// superseded.
    #[tracing::instrument(skip(self))]
    pub fn begin_install(&mut self) -> InstallSession {
        self.generation += 1;
        if let Some(previous) = self.active.replace(self.generation) {
            tracing::warn!(previous, "superseding unfinished install");
        }
        self.state = InstallState::Armed;

        let region = self.flash.region().clone();
        tracing::debug!(session = self.generation, partition = %region.partition, "install armed");
        InstallSession {
            id: self.generation,
            region,
            write_position: 0,
            erase_length: None,
            started: Instant::now(),
        }
    }

    /// The request announced its body length: erase the blocks that will hold it.
    #[tracing::instrument(skip(self, session), fields(session = session.id))]
    pub fn content_length(
        &mut self,
        session: &mut InstallSession,
        length: u64,
    ) -> Result<(), InstallError> {
        if !self.is_live(session) {
            tracing::debug!("content length for inactive session ignored");
            return Ok(());
        }
        if session.erase_length.is_some() {
            tracing::warn!("duplicate content length ignored");
            return Ok(());
        }

        let capacity = session.region.total_size;
        let erase_length = match u32::try_from(length) {
            Ok(erase_length) if erase_length <= capacity => erase_length,
            _ => {
                self.abort(session);
                return Err(InstallError::ContentTooLarge { length, capacity });
            }
        };

        self.state = InstallState::Erasing;
        if let Err(e) = self.erase(erase_length, session.region.block_size) {
            self.abort(session);
            return Err(e);
        }

        session.erase_length = Some(erase_length);
        session.write_position = 0;
        Ok(())
    }

    fn erase(&mut self, erase_length: u32, block_size: u32) -> Result<(), InstallError> {
        let plan = erase_plan(erase_length, block_size)?;
        tracing::debug!(erase_length, blocks = plan.len(), "erasing");
        for block in plan {
            self.flash.erase_block(block)?;
        }
        Ok(())
    }

    /// Write one body fragment at the current position.
    #[tracing::instrument(skip(self, session, data), fields(session = session.id, length = data.len()))]
    pub fn write_fragment(
        &mut self,
        session: &mut InstallSession,
        data: &[u8],
    ) -> Result<FragmentOutcome, InstallError> {
        if !self.is_live(session) {
            tracing::debug!("fragment for inactive session dropped");
            return Ok(FragmentOutcome::Dropped);
        }
        let Some(erase_length) = session.erase_length else {
            tracing::debug!("no content length yet, fragment dropped");
            return Ok(FragmentOutcome::Dropped);
        };

        let position = session.write_position;
        if position as u64 + data.len() as u64 > erase_length as u64 {
            self.abort(session);
            return Err(InstallError::WriteOverflow {
                position,
                length: data.len(),
                erase_length,
            });
        }

        if let Err(e) = self.flash.write(position, data) {
            self.abort(session);
            return Err(e.into());
        }

        // bounded by erase_length above
        session.write_position = position + data.len() as u32;
        self.state = InstallState::Writing;
        tracing::info!("received {} bytes of mod", data.len());
        Ok(FragmentOutcome::Written {
            position: session.write_position,
        })
    }

    /// The request body has been fully received.
    #[tracing::instrument(skip(self, session), fields(session = session.id))]
    pub fn body_complete(&mut self, session: &mut InstallSession) -> InstallState {
        if !self.is_live(session) {
            tracing::debug!("completion for inactive session ignored");
            return self.state;
        }

        self.active = None;
        match self.state {
            InstallState::Erasing | InstallState::Writing => {
                tracing::info!(bytes = session.write_position, "installed mod");
                self.state = InstallState::Complete;
                self.schedule_restart();
            }
            state => {
                tracing::warn!(?state, "install request ended without a content length");
                self.state = InstallState::Idle;
            }
        }
        self.state
    }

    /// Invalidate the stored payload and restart, cancelling any install in
    /// progress.
    #[tracing::instrument(skip(self))]
    pub fn uninstall(&mut self) -> Result<(), InstallError> {
        if let Some(session) = self.active.take() {
            tracing::info!(session, "uninstall cancels install in progress");
        }
        self.state = InstallState::Uninstalling;

        self.flash.write(0, &[0; SIGNATURE_LENGTH])?;
        tracing::info!("uninstalled mod");
        self.schedule_restart();
        Ok(())
    }

    fn schedule_restart(&mut self) {
        if self.restart_scheduled {
            tracing::warn!("restart already scheduled");
            return;
        }
        self.restart_scheduled = true;
        tracing::debug!(delay = ?self.config.restart_delay, "scheduling restart");
        self.restart.schedule(self.config.restart_delay);
    }

    fn is_live(&mut self, session: &InstallSession) -> bool {
        if self.active != Some(session.id) {
            return false;
        }
        if let Some(limit) = self.config.stale_after {
            if session.erase_length.is_none() && session.started.elapsed() > limit {
                tracing::warn!(session = session.id, ?limit, "discarding stale install");
                self.active = None;
                self.state = InstallState::Idle;
                return false;
            }
        }
        true
    }

    /// Destroy a session whose request failed or went away. Aborting a
    /// session that is no longer live does nothing.
    pub fn abort(&mut self, session: &InstallSession) {
        if self.active != Some(session.id) {
            return;
        }
        tracing::warn!(
            session = session.id,
            position = session.write_position,
            "install aborted"
        );
        self.active = None;
        self.state = InstallState::Idle;
    }
}
