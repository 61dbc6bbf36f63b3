//! 交互式模拟会话
//!
//! 会话独占一个网与其当前（实时）标识。只有进入模拟模式后才能发生迁移；
//! 离开模拟模式时恢复到初始标识。实时标识只由有限计数构成，从不含 `ω`。
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::net::ids::TransitionId;
use crate::net::structure::Marking;
use crate::net::{FireError, Net};

#[derive(Debug, Clone)]
pub struct SimulationSession {
    net: Net,
    initial: Marking,
    marking: Marking,
    simulating: bool,
    steps: usize,
}

impl SimulationSession {
    pub fn new(net: Net) -> Self {
        let initial = net.initial_marking();
        Self {
            net,
            marking: initial.clone(),
            initial,
            simulating: false,
            steps: 0,
        }
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    pub fn begin(&mut self) {
        if !self.simulating {
            log::debug!("simulation started at {}", self.marking);
        }
        self.simulating = true;
    }

    /// Leaves simulation mode and puts the initial marking back.
    pub fn end(&mut self) {
        if self.simulating {
            log::debug!("simulation ended after {} steps at {}", self.steps, self.marking);
        }
        self.simulating = false;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.marking = self.initial.clone();
        self.steps = 0;
    }

    pub fn is_active(&self, transition: TransitionId) -> bool {
        self.net.is_active(transition, &self.marking, self.simulating)
    }

    pub fn active_transitions(&self) -> Vec<TransitionId> {
        if !self.simulating {
            return Vec::new();
        }
        self.net.enabled_transitions(&self.marking)
    }

    pub fn fire(&mut self, transition: TransitionId) -> Result<&Marking, FireError> {
        if !self.simulating {
            return Err(FireError::SimulationInactive);
        }
        self.marking = self.net.fire(&self.marking, transition)?;
        self.steps += 1;
        log::trace!("fired {} -> {}", transition, self.marking);
        Ok(&self.marking)
    }

    /// Fires one active transition chosen uniformly; `None` when the live
    /// marking is a deadlock.
    pub fn fire_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Option<TransitionId>, FireError> {
        if !self.simulating {
            return Err(FireError::SimulationInactive);
        }
        let active = self.active_transitions();
        let Some(&transition) = active.choose(rng) else {
            return Ok(None);
        };
        self.fire(transition)?;
        Ok(Some(transition))
    }
}
