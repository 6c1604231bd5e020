use thiserror::Error;

pub mod geometry;
pub mod ground;
pub mod map;
pub mod movement;
pub mod sprite;

pub use geometry::{Direction4, Direction8, Point, Rect};
pub use ground::{Ground, GroundError, GroundGrid, Layer, CELL_SIZE};
pub use map::{
    Capabilities, CollisionDispatch, CollisionEvent, CollisionHandler, CollisionKind,
    CollisionMode, CollisionModes, CustomCollisionTest, Entity, EntityDesc, EntityError,
    EntityId, EntityKind, GroundSensitivity, KindSet, Map, ObstacleRule, TileAnimationSequence,
};
pub use movement::{
    FollowMovement, JumpMovement, Movement, MovementCore, MovementHost, MovementState,
    MovementTarget, PathMovement, PixelMovement, PlayerMovement, StraightMovement,
    TargetMovement, Trajectory, TrajectoryError,
};
pub use sprite::{
    load_sprite_image, PixelMask, Sprite, SpriteAnimation, SpriteAnimationSet, SpriteDirection,
    SpriteError,
};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Ground(#[from] GroundError),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error(transparent)]
    Sprite(#[from] SpriteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_map() -> Result<Map, KernelError> {
        let mut map = Map::new(64, 64)?;
        map.add_tile(Layer::Low, Rect::new(0, 0, 16, 8), Ground::WallTopLeft)?;
        Ok(map)
    }

    #[test]
    fn kernel_error_wraps_module_errors() {
        let err = build_map().expect_err("err");
        assert!(matches!(
            err,
            KernelError::Ground(GroundError::DiagonalOnNonSquareTile { .. })
        ));
        assert!(err.to_string().contains("square"));

        let err: KernelError = PathMovement::new("0x", 10.0, false, false, false)
            .expect_err("err")
            .into();
        assert!(matches!(err, KernelError::Trajectory(_)));
    }
}
