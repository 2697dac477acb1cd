// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity 124: Transformation Matrix, `p' = R p + T`.
//!
//! Forms: 0 orthonormal right-handed, 1 orthonormal left-handed, 10/11/12
//! special finite-element variants. The rotation is dimensionless; only the
//! translation rescales.

use nalgebra::{Matrix3, Point3, Vector3};

use super::TOL_BOOK;
use crate::entity::{EntityClass, EntityCore, EntityId, EntityKind, Resolver, SeqMap};
use crate::error::Result;
use crate::global::GlobalParams;
use crate::pd::PdCursor;

#[derive(Debug, Clone)]
pub struct TransformationMatrix {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for TransformationMatrix {
    fn default() -> Self {
        TransformationMatrix {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl TransformationMatrix {
    pub fn apply(&self, p: Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// Compose with a parent transform: `(self ∘ other)(p) = self(other(p))`.
    pub fn compose(&self, other: &TransformationMatrix) -> TransformationMatrix {
        TransformationMatrix {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }
}

impl EntityClass for TransformationMatrix {
    fn kind(&self) -> EntityKind {
        EntityKind::TransformationMatrix
    }

    fn form_ok(form: i32) -> bool {
        matches!(form, 0 | 1 | 10 | 11 | 12)
    }

    fn read_pd(
        &mut self,
        pd: &mut PdCursor,
        _core: &mut EntityCore,
        _globals: &GlobalParams,
    ) -> Result<()> {
        // row order: R11 R12 R13 T1, R21 R22 R23 T2, R31 R32 R33 T3
        for row in 0..3 {
            for col in 0..3 {
                self.rotation[(row, col)] = pd.read_real("rotation")?;
            }
            self.translation[row] = pd.read_real("translation")?;
        }
        Ok(())
    }

    fn format_pd(&self, out: &mut Vec<String>, _core: &EntityCore, _map: &SeqMap) -> Result<()> {
        for row in 0..3 {
            for col in 0..3 {
                out.push(crate::pd::format_pd_real(self.rotation[(row, col)], TOL_BOOK));
            }
            out.push(crate::pd::format_pd_real(self.translation[row], TOL_BOOK));
        }
        Ok(())
    }

    fn associate(&mut self, _r: &mut Resolver) -> Result<()> {
        Ok(())
    }

    fn rescale(&mut self, sf: f64) {
        self.translation *= sf;
    }

    fn children(&self) -> Vec<EntityId> {
        Vec::new()
    }

    fn unlink(&mut self, _child: EntityId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_row_major_with_interleaved_translation() {
        let text = "124,1.0,0.0,0.0,10.0,0.0,1.0,0.0,20.0,0.0,0.0,1.0,30.0;";
        let mut pd = PdCursor::new(text, ',', ';');
        pd.read_int("type").unwrap();

        let mut t = TransformationMatrix::default();
        let mut core = crate::entity::Entity::new(EntityKind::TransformationMatrix).core;
        t.read_pd(&mut pd, &mut core, &GlobalParams::default()).unwrap();

        assert_eq!(t.rotation, Matrix3::identity());
        assert_eq!(t.translation, Vector3::new(10.0, 20.0, 30.0));
        assert_eq!(t.apply(Point3::new(1.0, 1.0, 1.0)), Point3::new(11.0, 21.0, 31.0));
    }

    #[test]
    fn rescale_leaves_rotation_alone() {
        let mut t = TransformationMatrix {
            rotation: Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0),
            translation: Vector3::new(1.0, 0.0, 2.0),
        };
        t.rescale(25.4);
        assert_eq!(t.rotation[(0, 0)], -1.0);
        assert_eq!(t.translation, Vector3::new(25.4, 0.0, 50.8));
    }

    #[test]
    fn flip_across_plane() {
        // the cylinder builder's bottom-arc flip: negate X and Z, shift Z
        let bot = 1.0;
        let t = TransformationMatrix {
            rotation: Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0),
            translation: Vector3::new(0.0, 0.0, 2.0 * bot),
        };
        let p = t.apply(Point3::new(3.0, 4.0, 1.0));
        assert_eq!(p, Point3::new(-3.0, 4.0, 1.0));
    }
}
