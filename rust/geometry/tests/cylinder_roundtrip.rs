// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cylinder construction end to end: instantiate, validate, emit, re-read,
//! and rescale.

use iges_lite_core::{EntityKind, Model, Payload, Unit};
use iges_lite_geometry::CylinderBuilder;
use nalgebra::Point3;

fn full_cylinder(model: &mut Model) -> Vec<iges_lite_core::EntityId> {
    let b = CylinderBuilder::new(
        Point3::origin(),
        Point3::new(10.0, 0.0, 0.0),
        Point3::new(10.0, 0.0, 0.0),
    )
    .unwrap();
    b.instantiate(model, 5.0, 0.0).unwrap()
}

#[test]
fn full_cylinder_is_two_trimmed_surfaces_sharing_one_surface() {
    let mut model = Model::new();
    let trims = full_cylinder(&mut model);

    assert_eq!(trims.len(), 2);
    assert_eq!(model.entities_of_kind(EntityKind::TrimmedSurface).len(), 2);
    assert_eq!(
        model.entities_of_kind(EntityKind::SurfaceOfRevolution).len(),
        1
    );

    // both trims sit on the same surface of revolution
    let surfaces: Vec<_> = trims
        .iter()
        .map(|&t| match &model.entity(t).unwrap().payload {
            Payload::TrimmedSurface(ts) => ts.surface.unwrap(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(surfaces[0], surfaces[1]);

    // nothing in the construction violates an invariant
    let violations = model.validate();
    assert!(violations.is_empty(), "defects: {:?}", violations);
}

#[test]
fn cylinder_survives_emission_and_reread() {
    let mut model = Model::new();
    let before = {
        full_cylinder(&mut model);
        model.len()
    };

    let text = model.render().unwrap();
    assert_eq!(model.len(), before, "render must not cull the construction");

    let (reread, warnings) = Model::parse(&text).unwrap();
    assert!(warnings.is_empty(), "defects on re-read: {:?}", warnings);
    assert_eq!(reread.len(), before);
    assert_eq!(reread.entities_of_kind(EntityKind::TrimmedSurface).len(), 2);
    assert_eq!(reread.entities_of_kind(EntityKind::CurveOnSurface).len(), 2);
    assert_eq!(reread.entities_of_kind(EntityKind::NurbsCurve).len(), 8);
}

#[test]
fn rescaling_spares_parameter_space_bounds() {
    let mut model = Model::new();
    let trims = full_cylinder(&mut model);

    // remember one parameter-space control net and the flip rotation
    let cos = match &model.entity(trims[0]).unwrap().payload {
        Payload::TrimmedSurface(t) => t.outer.unwrap(),
        _ => unreachable!(),
    };
    let bptr = match &model.entity(cos).unwrap().payload {
        Payload::CurveOnSurface(c) => c.bptr.unwrap(),
        _ => unreachable!(),
    };
    let uv_member = match &model.entity(bptr).unwrap().payload {
        Payload::CompositeCurve(cc) => cc.segment(0).unwrap(),
        _ => unreachable!(),
    };
    let uv_before = match &model.entity(uv_member).unwrap().payload {
        Payload::NurbsCurve(n) => n.control.clone(),
        _ => unreachable!(),
    };

    let flip = model.entities_of_kind(EntityKind::TransformationMatrix)[0];
    let rotation_before = match &model.entity(flip).unwrap().payload {
        Payload::TransformationMatrix(t) => t.rotation,
        _ => unreachable!(),
    };

    model.convert_units(Unit::Millimeter);

    // model-space geometry scaled by 25.4
    let arcs = model.entities_of_kind(EntityKind::CircularArc);
    let radius = match &model.entity(arcs[0]).unwrap().payload {
        Payload::CircularArc(a) => a.radius(),
        _ => unreachable!(),
    };
    assert!((radius - 254.0).abs() < 1e-9);

    // the rotation matrix is untouched, the translation scaled
    match &model.entity(flip).unwrap().payload {
        Payload::TransformationMatrix(t) => {
            assert_eq!(t.rotation, rotation_before);
        }
        _ => unreachable!(),
    }

    // the (u, v) bound kept its in-plane coordinates
    match &model.entity(uv_member).unwrap().payload {
        Payload::NurbsCurve(n) => {
            for (after, before) in n.control.iter().zip(&uv_before) {
                assert_eq!(after.x, before.x);
                assert_eq!(after.y, before.y);
            }
        }
        _ => unreachable!(),
    }
}

#[test]
fn quarter_cylinder_has_one_trim() {
    let mut model = Model::new();
    let b = CylinderBuilder::new(
        Point3::origin(),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    )
    .unwrap();
    let trims = b.instantiate(&mut model, 1.0, 0.0).unwrap();
    assert_eq!(trims.len(), 1);

    let violations = model.validate();
    assert!(violations.is_empty(), "defects: {:?}", violations);
}
