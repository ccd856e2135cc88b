use std::collections::BTreeSet;
use std::net::TcpListener;
use std::sync::Arc;

use common::prelude::*;

/// Hands out host ports for new containers.
///
/// A port is free when the container runtime does not publish it, this
/// process has not handed it out yet, and (optionally) it can be bound
/// locally. Allocations are remembered until [`PortAllocator::release`] since
/// containers publish their ports only after they start.
pub struct PortAllocator {
    runner: Arc<dyn CommandRunner>,
    reserved: BTreeSet<u16>,
    bind_probe: bool,
}

impl PortAllocator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        PortAllocator {
            runner,
            reserved: BTreeSet::new(),
            bind_probe: true,
        }
    }

    /// Skips the local bind test and trusts the runtime listing alone.
    pub fn without_bind_probe(mut self) -> Self {
        self.bind_probe = false;
        self
    }

    pub fn port_in_use(&self, port: u16) -> Result<bool, ChainError> {
        let published = self.runner.docker_host_ports()?;
        Ok(self.taken(port, &published))
    }

    /// Linear probe upward from `base` for the first free port.
    pub fn allocate(&mut self, base: u16) -> Result<u16, ChainError> {
        let published = self.runner.docker_host_ports()?;
        let mut port = base;
        while self.taken(port, &published) {
            port = port.checked_add(1).ok_or_else(|| {
                ChainError::ResourceExhausted(format!("no free port at or above {}", base))
            })?;
        }
        debug!("PortAllocator: allocated port {} (base {})", port, base);
        self.reserved.insert(port);
        Ok(port)
    }

    pub fn release(&mut self, port: u16) {
        self.reserved.remove(&port);
    }

    fn taken(&self, port: u16, published: &BTreeSet<u16>) -> bool {
        self.reserved.contains(&port)
            || published.contains(&port)
            || (self.bind_probe && TcpListener::bind(("0.0.0.0", port)).is_err())
    }
}
