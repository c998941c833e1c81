//! Lane-to-port binding.

use thiserror::Error;

use crate::config::PoolConfig;

/// A lane layout that cannot give every lane its own port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanePlanError {
    #[error("lane ports cannot start at port 0")]
    ZeroStartPort,

    #[error("{concurrency} lanes starting at port {start_port} exceed 65535")]
    PortRangeOverflow { start_port: u16, concurrency: usize },
}

/// Static assignment of lanes to listen ports: lane `i` always uses `start_port + i`.
///
/// Because the mapping is 1:1 and fixed for the run, two concurrently running
/// engines can never be told to bind the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanePlan {
    concurrency: usize,
    start_port: u16,
}

impl LanePlan {
    /// `concurrency` is clamped to at least one lane. Every lane port must fit in `u16`.
    pub fn new(concurrency: usize, start_port: u16) -> Result<Self, LanePlanError> {
        let concurrency = concurrency.max(1);
        if start_port == 0 {
            return Err(LanePlanError::ZeroStartPort);
        }
        let fits = u16::try_from(concurrency - 1)
            .ok()
            .and_then(|last| start_port.checked_add(last))
            .is_some();
        if !fits {
            return Err(LanePlanError::PortRangeOverflow {
                start_port,
                concurrency,
            });
        }

        Ok(Self {
            concurrency,
            start_port,
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, LanePlanError> {
        Self::new(config.concurrency, config.start_port)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn start_port(&self) -> u16 {
        self.start_port
    }

    /// Port owned by `lane` for the whole run; `None` for a lane outside the plan.
    pub fn port_for(&self, lane: usize) -> Option<u16> {
        if lane >= self.concurrency {
            return None;
        }
        u16::try_from(lane)
            .ok()
            .and_then(|offset| self.start_port.checked_add(offset))
    }

    /// Lanes worth starting for `work` items; never more than there is work.
    pub fn lanes_for(&self, work: usize) -> usize {
        self.concurrency.min(work)
    }
}
