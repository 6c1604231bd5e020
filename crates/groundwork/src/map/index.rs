use super::entity::{Entity, EntityId};
use crate::ground::Layer;

/// Per-layer membership lists. Layer-independent entities appear in the
/// lists of every layer.
#[derive(Debug, Default)]
pub struct EntityIndex {
    obstacles: [Vec<EntityId>; 3],
    ground_modifiers: [Vec<EntityId>; 3],
    detectors: [Vec<EntityId>; 3],
}

impl EntityIndex {
    pub fn insert(&mut self, entity: &Entity) {
        let capabilities = entity.capabilities();
        for layer in Self::layers_of(entity) {
            let index = layer.index();
            if capabilities.is_obstacle() {
                self.obstacles[index].push(entity.id());
            }
            if capabilities.is_ground_modifier() {
                self.ground_modifiers[index].push(entity.id());
            }
            if capabilities.is_detector() {
                self.detectors[index].push(entity.id());
            }
        }
    }

    pub fn remove(&mut self, id: EntityId) {
        for list in self
            .obstacles
            .iter_mut()
            .chain(self.ground_modifiers.iter_mut())
            .chain(self.detectors.iter_mut())
        {
            list.retain(|candidate| *candidate != id);
        }
    }

    pub fn obstacles(&self, layer: Layer) -> &[EntityId] {
        &self.obstacles[layer.index()]
    }

    /// In insertion order; later entries take precedence.
    pub fn ground_modifiers(&self, layer: Layer) -> &[EntityId] {
        &self.ground_modifiers[layer.index()]
    }

    pub fn detectors(&self, layer: Layer) -> &[EntityId] {
        &self.detectors[layer.index()]
    }

    fn layers_of(entity: &Entity) -> Vec<Layer> {
        if entity.has_layer_independent_collisions() {
            Layer::ALL.to_vec()
        } else {
            vec![entity.layer()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::map::detection::CollisionMode;
    use crate::map::entity::{EntityDesc, EntityKind, ObstacleRule};

    #[test]
    fn layer_independent_obstacles_are_listed_on_every_layer() {
        let stairs = EntityDesc::new(EntityKind::Stairs, Point::ZERO, 16, 16)
            .layer(Layer::Intermediate)
            .build(EntityId(1))
            .expect("stairs");
        let block = EntityDesc::new(EntityKind::Block, Point::ZERO, 16, 16)
            .layer(Layer::High)
            .build(EntityId(2))
            .expect("block");
        let mut index = EntityIndex::default();
        index.insert(&stairs);
        index.insert(&block);
        assert_eq!(index.obstacles(Layer::Low), &[EntityId(1)]);
        assert_eq!(index.obstacles(Layer::Intermediate), &[EntityId(1)]);
        assert_eq!(index.obstacles(Layer::High), &[EntityId(1), EntityId(2)]);
    }

    #[test]
    fn lists_follow_capabilities_and_removal_clears_them() {
        let sensor = EntityDesc::new(EntityKind::Sensor, Point::ZERO, 16, 16)
            .detect(CollisionMode::Origin)
            .obstacle(ObstacleRule::Never)
            .build(EntityId(3))
            .expect("sensor");
        let ice = EntityDesc::new(EntityKind::DynamicTile, Point::ZERO, 16, 16)
            .ground_modifier(crate::ground::Ground::Ice)
            .build(EntityId(4))
            .expect("ice");
        let mut index = EntityIndex::default();
        index.insert(&sensor);
        index.insert(&ice);
        assert!(index.obstacles(Layer::Low).is_empty());
        assert_eq!(index.detectors(Layer::Low), &[EntityId(3)]);
        assert_eq!(index.ground_modifiers(Layer::Low), &[EntityId(4)]);
        index.remove(EntityId(3));
        index.remove(EntityId(4));
        assert!(index.detectors(Layer::Low).is_empty());
        assert!(index.ground_modifiers(Layer::Low).is_empty());
    }
}
