//! Entity registry for simulation bookkeeping.
//!
//! Uses hecs as the ECS backend. The rendering core has no dependency on
//! this crate; entities only describe what the application simulates.

use glam::Vec3;
pub use hecs::{Entity, World};

/// Transform component.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: glam::Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: glam::Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// A simulation system ticked once per frame.
pub trait System {
    fn tick(&mut self, world: &mut World, dt: f32);
}

/// Entity world plus the systems that tick it.
pub struct Simulation {
    world: World,
    systems: Vec<Box<dyn System>>,
    running: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            systems: Vec::new(),
            running: true,
        }
    }

    /// Access the entity world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the entity world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Register a system; systems tick in registration order.
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Tick every system with the frame delta. No-op once stopped.
    pub fn tick(&mut self, dt: f32) {
        if !self.running {
            return;
        }
        for system in &mut self.systems {
            system.tick(&mut self.world, dt);
        }
    }

    /// Stop ticking.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resume ticking.
    pub fn restart(&mut self) {
        self.running = true;
    }

    /// Whether the simulation is ticking.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Spin {
        rate: f32,
    }

    impl System for Spin {
        fn tick(&mut self, world: &mut World, dt: f32) {
            for (_, transform) in world.query_mut::<&mut Transform>() {
                transform.rotation *= glam::Quat::from_rotation_y(self.rate * dt);
            }
        }
    }

    #[test]
    fn systems_tick_entities() {
        let mut sim = Simulation::new();
        let entity = sim.world_mut().spawn((Transform::default(),));
        sim.add_system(Spin {
            rate: std::f32::consts::PI,
        });

        sim.tick(1.0);

        let transform = *sim.world().get::<&Transform>(entity).unwrap();
        let expected = glam::Quat::from_rotation_y(std::f32::consts::PI);
        assert!(transform.rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn stopped_simulation_does_not_tick() {
        let mut sim = Simulation::new();
        let entity = sim.world_mut().spawn((Transform::default(),));
        sim.add_system(Spin { rate: 1.0 });

        sim.stop();
        sim.tick(1.0);

        let transform = *sim.world().get::<&Transform>(entity).unwrap();
        assert_eq!(transform.rotation, glam::Quat::IDENTITY);

        sim.restart();
        assert!(sim.is_running());
    }
}
