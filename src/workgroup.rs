use crate::error::{RandomartError, RandomartResult};

/// The subset of device limits that bound a compute workgroup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupLimits {
    pub max_threads_per_group: u32,
    pub max_size_x: u32,
    pub max_size_y: u32,
    pub max_groups_per_dimension: u32,
}

impl GroupLimits {
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        Self {
            max_threads_per_group: limits.max_compute_invocations_per_workgroup,
            max_size_x: limits.max_compute_workgroup_size_x,
            max_size_y: limits.max_compute_workgroup_size_y,
            max_groups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkgroupGeometry {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorkgroupGeometry {
    /// `width` is the execution width capped by the device, `height` is
    /// `floor(max_threads / width)`. The product never exceeds `max_threads_per_group`.
    pub fn derive(execution_width: u32, limits: GroupLimits) -> RandomartResult<Self> {
        if limits.max_threads_per_group == 0 || limits.max_size_x == 0 || limits.max_size_y == 0 {
            return Err(RandomartError::gpu(
                "device reports no compute workgroup capacity",
            ));
        }

        let width = execution_width
            .min(limits.max_size_x)
            .min(limits.max_threads_per_group)
            .max(1);
        let height = (limits.max_threads_per_group / width)
            .min(limits.max_size_y)
            .max(1);

        Ok(Self { width, height })
    }

    pub fn threads(&self) -> u32 {
        self.width * self.height
    }

    /// Ceiling division of the image extent; the high edge may be over-covered.
    pub fn grid_for(&self, width: u32, height: u32) -> GridSize {
        GridSize {
            x: width.div_ceil(self.width),
            y: height.div_ceil(self.height),
            z: 1,
        }
    }

    pub fn checked_grid_for(
        &self,
        width: u32,
        height: u32,
        limits: GroupLimits,
    ) -> RandomartResult<GridSize> {
        let grid = self.grid_for(width, height);
        if grid.x > limits.max_groups_per_dimension || grid.y > limits.max_groups_per_dimension {
            return Err(RandomartError::gpu(format!(
                "dispatch grid {}x{} exceeds device limit of {} workgroups per dimension",
                grid.x, grid.y, limits.max_groups_per_dimension
            )));
        }
        Ok(grid)
    }

    /// Pipeline-overridable constants consumed by `@workgroup_size(group_w, group_h, 1)`.
    pub fn pipeline_constants(&self) -> [(&'static str, f64); 2] {
        [
            (GROUP_WIDTH_CONSTANT, f64::from(self.width)),
            (GROUP_HEIGHT_CONSTANT, f64::from(self.height)),
        ]
    }
}

pub const GROUP_WIDTH_CONSTANT: &str = "group_w";
pub const GROUP_HEIGHT_CONSTANT: &str = "group_h";

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_threads: u32) -> GroupLimits {
        GroupLimits {
            max_threads_per_group: max_threads,
            max_size_x: 1024,
            max_size_y: 1024,
            max_groups_per_dimension: 65535,
        }
    }

    #[test]
    fn height_is_floor_of_threads_over_width() {
        let g = WorkgroupGeometry::derive(32, limits(1024)).unwrap();
        assert_eq!(g, WorkgroupGeometry { width: 32, height: 32 });

        let g = WorkgroupGeometry::derive(24, limits(256)).unwrap();
        assert_eq!(g.width, 24);
        assert_eq!(g.height, 10);
    }

    #[test]
    fn product_never_exceeds_max_threads() {
        for max_threads in [1u32, 7, 64, 256, 1000, 1024] {
            for exec in [1u32, 3, 8, 16, 32, 64, 2048] {
                let g = WorkgroupGeometry::derive(exec, limits(max_threads)).unwrap();
                assert!(g.width >= 1 && g.height >= 1);
                assert!(
                    g.threads() <= max_threads,
                    "{exec} on {max_threads}: {g:?}"
                );
            }
        }
    }

    #[test]
    fn axis_limits_are_respected() {
        let l = GroupLimits {
            max_threads_per_group: 256,
            max_size_x: 16,
            max_size_y: 4,
            max_groups_per_dimension: 65535,
        };
        let g = WorkgroupGeometry::derive(32, l).unwrap();
        assert_eq!(g, WorkgroupGeometry { width: 16, height: 4 });
    }

    #[test]
    fn grid_uses_ceiling_division() {
        let g = WorkgroupGeometry {
            width: 8,
            height: 8,
        };
        let grid = g.grid_for(513, 512);
        assert_eq!(grid.x, 65);
        assert_eq!(grid.y, 64);
        assert_eq!(grid.z, 1);
    }

    #[test]
    fn grid_covers_tiny_images() {
        let g = WorkgroupGeometry {
            width: 32,
            height: 8,
        };
        assert_eq!(g.grid_for(1, 1), GridSize { x: 1, y: 1, z: 1 });
        let grid = g.grid_for(4, 4);
        assert!(grid.x * g.width >= 4 && grid.y * g.height >= 4);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let g = WorkgroupGeometry {
            width: 1,
            height: 1,
        };
        let l = GroupLimits {
            max_groups_per_dimension: 100,
            ..limits(256)
        };
        assert!(g.checked_grid_for(100, 100, l).is_ok());
        assert!(g.checked_grid_for(101, 1, l).is_err());
    }

    #[test]
    fn empty_limits_are_an_error() {
        assert!(WorkgroupGeometry::derive(32, limits(0)).is_err());
    }

    #[test]
    fn constants_carry_geometry() {
        let g = WorkgroupGeometry {
            width: 32,
            height: 8,
        };
        let c = g.pipeline_constants();
        assert_eq!(c[0], ("group_w", 32.0));
        assert_eq!(c[1], ("group_h", 8.0));
    }
}
