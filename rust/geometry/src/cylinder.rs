// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertical cylindrical surface builder.
//!
//! Splits the requested angular span into one to three circular arcs (so
//! each fits a single Circular Arc entity), then instantiates the full
//! IGES graph for the swept region: a shared Surface of Revolution, the
//! per-arc model-space and parameter-space boundary chains, a Curve on
//! Surface and a Trimmed Surface per arc, and the flip transform that
//! mirrors each bottom arc. Every entity the build creates is recorded and
//! removed again if any later step fails.

use std::f64::consts::{PI, TAU};

use nalgebra::{Matrix3, Point3, Vector3};
use tracing::debug;

use iges_lite_core::entities::{CircularArc, Line, TransformationMatrix};
use iges_lite_core::{Dependency, EntityId, EntityKind, Model, Payload};

use crate::error::{Error, Result};

/// Two points match when closer than this.
const POINT_TOL: f64 = 1e-8;
/// Minimum distinguishable cylinder height.
const MIN_HEIGHT: f64 = 0.001;

/// Builder for a vertical cylindrical trimmed surface.
///
/// The foot print is defined on the Z = 0 plane: a centre plus start and
/// end points on the circle, swept counter-clockwise from start to end.
/// Coincident start and end produce the full cylinder.
#[derive(Debug, Clone)]
pub struct CylinderBuilder {
    radius: f64,
    /// Number of arcs the span decomposes into (1..=3).
    narcs: usize,
    /// Arc span angles, two per arc.
    angles: [f64; 6],
    /// `points[0]` is the centre; `points[1..=narcs+1]` the arc break
    /// points on the circle.
    points: [Point3<f64>; 5],
}

impl CylinderBuilder {
    /// Validate the foot print and decompose the angular span.
    pub fn new(center: Point3<f64>, start: Point3<f64>, end: Point3<f64>) -> Result<CylinderBuilder> {
        if center.z != 0.0 || start.z != 0.0 || end.z != 0.0 {
            return Err(Error::InvalidParams(
                "cylinder foot print must lie on the Z = 0 plane".into(),
            ));
        }
        if (start - center).norm() < POINT_TOL || (end - center).norm() < POINT_TOL {
            return Err(Error::InvalidParams("zero radius".into()));
        }

        let rad1 = (start - center).xy().norm();
        let rad2 = (end - center).xy().norm();
        if (rad1 - rad2).abs() > POINT_TOL {
            return Err(Error::InvalidParams(format!(
                "start and end radii differ: {} vs {}",
                rad1, rad2
            )));
        }

        let mut b = CylinderBuilder {
            radius: rad1,
            narcs: 0,
            angles: [0.0; 6],
            points: [center; 5],
        };

        if (start - end).norm() < POINT_TOL {
            // full circle: two semicircles
            b.narcs = 2;
            b.angles = [0.0, PI, PI, TAU, 0.0, 0.0];
            b.points[1] = Point3::new(center.x + b.radius, center.y, 0.0);
            b.points[2] = Point3::new(center.x - b.radius, center.y, 0.0);
            b.points[3] = b.points[1];
            return Ok(b);
        }

        let ang1 = (start.y - center.y).atan2(start.x - center.x);
        let mut ang2 = (end.y - center.y).atan2(end.x - center.x);

        if ang2 < ang1 {
            ang2 += TAU;
        }

        if ang1 < 0.0 {
            let (a1, a2) = (ang1 + TAU, ang2 + TAU);
            b.angles[0] = a1;
            if a2 <= TAU {
                b.angles[1] = a2;
                b.narcs = 1;
            } else {
                b.angles[1] = TAU;
                b.angles[2] = 0.0;
                if a2 <= 3.0 * PI {
                    b.angles[3] = a2 - TAU;
                    b.narcs = 2;
                } else {
                    b.angles[3] = PI;
                    b.angles[4] = PI;
                    b.angles[5] = a2 - TAU;
                    b.narcs = 3;
                }
            }
        } else {
            b.angles[0] = ang1;
            if ang2 <= PI || (ang1 >= PI && ang2 <= TAU) {
                b.angles[1] = ang2;
                b.narcs = 1;
            } else if ang1 < PI {
                b.angles[1] = PI;
                b.angles[2] = PI;
                if ang2 <= TAU {
                    b.angles[3] = ang2;
                    b.narcs = 2;
                } else {
                    b.angles[3] = TAU;
                    b.angles[4] = 0.0;
                    b.angles[5] = ang2 - TAU;
                    b.narcs = 3;
                }
            } else if ang2 <= TAU {
                b.angles[1] = ang2;
                b.narcs = 1;
            } else {
                b.angles[1] = TAU;
                b.angles[2] = 0.0;
                b.angles[3] = ang2 - TAU;
                b.narcs = 2;
            }
        }

        b.points[1] = start;
        b.points[b.narcs + 1] = end;

        if b.narcs > 1 {
            b.points[2] = Point3::new(
                center.x + b.radius * b.angles[2].cos(),
                center.y + b.radius * b.angles[2].sin(),
                0.0,
            );
        }
        if b.narcs > 2 {
            b.points[3] = Point3::new(
                center.x + b.radius * b.angles[4].cos(),
                center.y + b.radius * b.angles[4].sin(),
                0.0,
            );
        }

        Ok(b)
    }

    pub fn arc_count(&self) -> usize {
        self.narcs
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Instantiate the cylinder between `bot` and `top` into `model`.
    ///
    /// Returns the per-arc Trimmed Surface entities. On any failure every
    /// entity created so far is deleted again and the model is left as it
    /// was.
    pub fn instantiate(
        &self,
        model: &mut Model,
        top: f64,
        bot: f64,
    ) -> Result<Vec<EntityId>> {
        if self.narcs == 0 {
            return Err(Error::InvalidParams("no foot print set".into()));
        }
        if (top - bot).abs() < MIN_HEIGHT {
            return Err(Error::InvalidParams("top and bottom coincide".into()));
        }
        let (top, bot) = if top < bot { (bot, top) } else { (top, bot) };

        let mut created = Vec::new();
        match self.build(model, top, bot, &mut created) {
            Ok(result) => {
                debug!(
                    arcs = self.narcs,
                    entities = created.len(),
                    "cylinder instantiated"
                );
                Ok(result)
            }
            Err(e) => {
                // unwind in reverse creation order; cascades may have
                // removed some of them already
                for id in created.into_iter().rev() {
                    let _ = model.del_entity(id);
                }
                Err(e)
            }
        }
    }

    fn build(
        &self,
        model: &mut Model,
        top: f64,
        bot: f64,
        created: &mut Vec<EntityId>,
    ) -> Result<Vec<EntityId>> {
        let narcs = self.narcs;
        let center = self.points[0];

        let subordinate = |model: &mut Model, kind: EntityKind, created: &mut Vec<EntityId>| {
            let id = model.new_entity(kind);
            created.push(id);
            if let Ok(e) = model.entity_mut(id) {
                e.core.status.depends = Dependency::Physical;
            }
            id
        };

        // shared lines: axis of revolution and generatrix
        let axis = subordinate(model, EntityKind::Line, created);
        set_line(
            model,
            axis,
            Point3::new(center.x, center.y, bot),
            Point3::new(center.x, center.y, top),
        )?;
        let generatrix = subordinate(model, EntityKind::Line, created);
        set_line(
            model,
            generatrix,
            Point3::new(center.x + self.radius, center.y, top),
            Point3::new(center.x + self.radius, center.y, bot),
        )?;

        let surf = subordinate(model, EntityKind::SurfaceOfRevolution, created);
        model.set_revolution_axis(surf, axis)?;
        model.set_revolution_generatrix(surf, generatrix)?;
        if let Payload::SurfaceOfRevolution(s) = &mut model.entity_mut(surf)?.payload {
            s.start_angle = 0.0;
            s.end_angle = TAU;
        }

        let mut trims = Vec::with_capacity(narcs);

        for i in 0..narcs {
            let a0 = self.angles[2 * i];
            let a1 = self.angles[2 * i + 1];
            let p_start = self.points[i + 1];
            let p_end = self.points[i + 2];

            // mirror across the vertical plane through the centre and
            // across Z = bot, turning the bottom arc clockwise
            let flip = subordinate(model, EntityKind::TransformationMatrix, created);
            if let Payload::TransformationMatrix(t) = &mut model.entity_mut(flip)?.payload {
                *t = TransformationMatrix {
                    rotation: Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0),
                    translation: Vector3::new(center.x, 0.0, 2.0 * bot),
                };
            }
            model.set_form(flip, 1)?;

            // model-space bound: ccw top arc, edge down, cw bottom arc,
            // edge up
            let arc_top = subordinate(model, EntityKind::CircularArc, created);
            if let Payload::CircularArc(a) = &mut model.entity_mut(arc_top)?.payload {
                *a = CircularArc {
                    z_offset: top,
                    x_center: center.x,
                    y_center: center.y,
                    x_start: p_start.x,
                    y_start: p_start.y,
                    x_end: p_end.x,
                    y_end: p_end.y,
                };
            }

            let arc_bot = subordinate(model, EntityKind::CircularArc, created);
            if let Payload::CircularArc(a) = &mut model.entity_mut(arc_bot)?.payload {
                *a = CircularArc {
                    z_offset: bot,
                    x_center: 0.0,
                    y_center: center.y,
                    x_start: center.x - p_end.x,
                    y_start: p_end.y,
                    x_end: center.x - p_start.x,
                    y_end: p_start.y,
                };
            }
            model.set_transform(arc_bot, Some(flip))?;

            let edge_down = subordinate(model, EntityKind::Line, created);
            set_line(
                model,
                edge_down,
                Point3::new(p_end.x, p_end.y, top),
                Point3::new(p_end.x, p_end.y, bot),
            )?;
            let edge_up = subordinate(model, EntityKind::Line, created);
            set_line(
                model,
                edge_up,
                Point3::new(p_start.x, p_start.y, bot),
                Point3::new(p_start.x, p_start.y, top),
            )?;

            let model_bound = subordinate(model, EntityKind::CompositeCurve, created);
            model.add_segment(model_bound, arc_top)?;
            model.add_segment(model_bound, edge_down)?;
            model.add_segment(model_bound, arc_bot)?;
            model.add_segment(model_bound, edge_up)?;

            // parameter-space bound: the (u, angle) rectangle of this arc
            let uv_rect = [
                ([0.0, a0], [0.0, a1]),
                ([0.0, a1], [1.0, a1]),
                ([1.0, a1], [1.0, a0]),
                ([1.0, a0], [0.0, a0]),
            ];
            let uv_bound = subordinate(model, EntityKind::CompositeCurve, created);
            for (from, to) in uv_rect {
                let nurbs = subordinate(model, EntityKind::NurbsCurve, created);
                model.set_nurbs_data(
                    nurbs,
                    &[
                        Point3::new(from[0], from[1], 0.0),
                        Point3::new(to[0], to[1], 0.0),
                    ],
                    &[1.0, 1.0],
                    &[0.0, 0.0, 1.0, 1.0],
                    2,
                    false,
                )?;
                model.add_segment(uv_bound, nurbs)?;
            }

            let bound = subordinate(model, EntityKind::CurveOnSurface, created);
            if let Payload::CurveOnSurface(c) = &mut model.entity_mut(bound)?.payload {
                c.crtn = 1;
                c.pref = 1;
            }
            model.set_cos_surface(bound, surf)?;
            model.set_cos_bptr(bound, uv_bound)?;
            model.set_cos_cptr(bound, model_bound)?;

            let trim = model.new_entity(EntityKind::TrimmedSurface);
            created.push(trim);
            model.set_trim_surface(trim, surf)?;
            model.set_trim_outer(trim, bound)?;

            trims.push(trim);
        }

        Ok(trims)
    }
}

fn set_line(model: &mut Model, id: EntityId, p1: Point3<f64>, p2: Point3<f64>) -> Result<()> {
    if let Payload::Line(l) = &mut model.entity_mut(id)?.payload {
        *l = Line {
            x1: p1.x,
            y1: p1.y,
            z1: p1.z,
            x2: p2.x,
            y2: p2.y,
            z2: p2.z,
        };
    }
    Ok(())
}
