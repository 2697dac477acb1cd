// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios: reading inline IGES content, re-emitting it, and
//! checking the graph laws across a full read/write cycle.

use iges_lite_core::{
    Dependency, EntityKind, Error, Model, Payload, Record, Section, Unit,
};
use nalgebra::Point3;

/// Assemble a file from raw 72-column section data.
struct FileBuilder {
    start: Vec<String>,
    dir: Vec<String>,
    param: Vec<(String, u32)>,
}

impl FileBuilder {
    fn new() -> Self {
        FileBuilder {
            start: vec!["integration fixture".to_string()],
            dir: Vec::new(),
            param: Vec::new(),
        }
    }

    /// Add one entity: DE pair plus a single parameter line.
    fn entity(&mut self, entity_type: i32, form: i32, status: &str, pd: &str) -> u32 {
        let de_seq = (self.dir.len() + 1) as u32;
        let pd_index = self.param.len() + 1;
        self.dir.push(format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            entity_type, pd_index, 0, 0, 0, 0, 0, 0, status
        ));
        self.dir.push(format!(
            "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
            entity_type, 0, 0, 1, form, "", "", "", 0
        ));
        self.param.push((pd.to_string(), de_seq));
        de_seq
    }

    fn build(&self) -> String {
        let mut lines = Vec::new();
        for (i, s) in self.start.iter().enumerate() {
            lines.push(Record::encode(s, Section::Start, (i + 1) as u32));
        }
        lines.push(Record::encode(
            ",,,,,,,,,,,,,,,,,,,,,,,,,;",
            Section::Global,
            1,
        ));
        for (i, d) in self.dir.iter().enumerate() {
            lines.push(Record::encode(d, Section::Directory, (i + 1) as u32));
        }
        for (i, (p, owner)) in self.param.iter().enumerate() {
            lines.push(Record::encode_parameter(p, *owner, (i + 1) as u32));
        }
        lines.push(Record::encode(
            &format!(
                "S{:>7}G{:>7}D{:>7}P{:>7}",
                self.start.len(),
                1,
                self.dir.len(),
                self.param.len()
            ),
            Section::Terminate,
            1,
        ));
        lines.join("\n")
    }
}

const INDEPENDENT: &str = "00000000";
const PHYSICAL: &str = "00010000";

#[test]
fn circle_payload_survives_a_round_trip() {
    let mut f = FileBuilder::new();
    let arc = f.entity(100, 0, PHYSICAL, "100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,1,{};", arc));

    let (mut model, _) = Model::parse(&f.build()).unwrap();
    let text = model.render().unwrap();
    assert!(text.contains("100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;"));

    // and the re-read equals the first model up to renumbering
    let (model2, _) = Model::parse(&text).unwrap();
    assert_eq!(model.len(), model2.len());
    let kinds1: Vec<EntityKind> = model.entities().map(|(_, e)| e.kind()).collect();
    let kinds2: Vec<EntityKind> = model2.entities().map(|(_, e)| e.kind()).collect();
    assert_eq!(kinds1, kinds2);
}

#[test]
fn emitted_parameter_section_is_stable() {
    let mut f = FileBuilder::new();
    let l1 = f.entity(110, 0, PHYSICAL, "110,0.0,0.0,0.0,1.0,0.0,0.0;");
    let l2 = f.entity(110, 0, PHYSICAL, "110,1.0,0.0,0.0,1.0,1.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,2,{},{};", l1, l2));

    let (mut model, warnings) = Model::parse(&f.build()).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);

    let text1 = model.render().unwrap();
    let (mut model2, _) = Model::parse(&text1).unwrap();
    let text2 = model2.render().unwrap();

    let p_lines = |t: &str| -> Vec<String> {
        t.lines()
            .filter(|l| l.len() == 80 && &l[72..73] == "P")
            .map(String::from)
            .collect()
    };
    assert_eq!(p_lines(&text1), p_lines(&text2));
}

#[test]
fn broken_chain_is_reported() {
    let mut f = FileBuilder::new();
    let l1 = f.entity(110, 0, PHYSICAL, "110,0.0,0.0,0.0,1.0,0.0,0.0;");
    // endpoints swapped: starts where nothing ends
    let l2 = f.entity(110, 0, PHYSICAL, "110,1.0,1.0,0.0,1.0,0.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,2,{},{};", l1, l2));

    let (_, warnings) = Model::parse(&f.build()).unwrap();
    assert!(warnings
        .iter()
        .any(|w| matches!(w.error, Error::InvariantViolation { entity_type: 102, .. })));
}

#[test]
fn nurbs_properties_derive_from_data() {
    let mut model = Model::new();
    let id = model.new_entity(EntityKind::NurbsCurve);
    model
        .set_nurbs_data(
            id,
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, 2.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
            ],
            &[1.0, 1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            4,
            false,
        )
        .unwrap();

    let text = model.render().unwrap();
    // K=3, M=3, PROP1=1 planar, PROP2=0 open, PROP3=1 polynomial, PROP4=0
    assert!(text.contains("126,3,3,1,0,1,0,"));

    let (model2, warnings) = Model::parse(&text).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    let ids = model2.entities_of_kind(EntityKind::NurbsCurve);
    match &model2.entity(ids[0]).unwrap().payload {
        Payload::NurbsCurve(n) => {
            assert_eq!(n.k, 3);
            assert_eq!(n.m, 3);
            assert!(n.is_planar());
            assert!(!n.is_closed());
            assert!(!n.is_rational());
            assert_eq!(n.knots.len(), 8);
            assert!(n.weights.iter().all(|&w| w > 0.0));
            // planar normal is the Z axis
            assert_eq!(n.plane_normal(), Some(nalgebra::Vector3::z()));
        }
        _ => unreachable!(),
    }
}

#[test]
fn dangling_reference_keeps_the_rest_of_the_file() {
    let mut f = FileBuilder::new();
    let arc = f.entity(100, 0, PHYSICAL, "100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,1,{};", arc));
    // a second composite pointing into the void
    f.entity(102, 0, INDEPENDENT, "102,1,99;");

    let (mut model, warnings) = Model::parse(&f.build()).unwrap();
    assert!(warnings
        .iter()
        .any(|w| matches!(w.error, Error::UnresolvedRef { de: 99 })));
    assert_eq!(model.len(), 3);

    // the model is still writable; the unresolved composite is culled
    let text = model.render().unwrap();
    assert!(text.contains("100,0.0"));
    assert_eq!(model.len(), 2);
}

#[test]
fn reference_bookkeeping_laws() {
    let mut model = Model::new();
    let cc = model.new_entity(EntityKind::CompositeCurve);
    let line = model.new_entity(EntityKind::Line);

    model.add_segment(cc, line).unwrap();
    let refs_before = model.entity(line).unwrap().core.refs.clone();

    // a second add of the same parent reports a duplicate
    let parent_type = model.entity(cc).unwrap().entity_type();
    let duplicate = model
        .entity_mut(line)
        .unwrap()
        .add_reference(cc, parent_type)
        .unwrap();
    assert!(duplicate);

    // add-then-del leaves refs unchanged
    model.entity_mut(line).unwrap().del_reference(cc).unwrap();
    model
        .entity_mut(line)
        .unwrap()
        .add_reference(cc, parent_type)
        .unwrap();
    assert_eq!(model.entity(line).unwrap().core.refs, refs_before);
}

#[test]
fn rescale_converts_inches_to_millimeters() {
    let mut f = FileBuilder::new();
    let arc = f.entity(100, 0, PHYSICAL, "100,0.0,0.0,0.0,1.0,0.0,-1.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,1,{};", arc));

    let (mut model, _) = Model::parse(&f.build()).unwrap();
    assert_eq!(model.globals.units, Unit::Inch);

    model.convert_units(Unit::Millimeter);
    assert_eq!(model.globals.units, Unit::Millimeter);

    let arcs = model.entities_of_kind(EntityKind::CircularArc);
    match &model.entity(arcs[0]).unwrap().payload {
        Payload::CircularArc(a) => {
            assert_eq!(a.x_start, 25.4);
            assert_eq!(a.x_end, -25.4);
        }
        _ => unreachable!(),
    }
    // the resolution follows the unit change
    assert!((model.globals.min_resolution - 25.4e-8).abs() < 1e-20);
}

#[test]
fn orphan_reporting_distinguishes_dependency() {
    let mut f = FileBuilder::new();
    // a physically dependent line nothing points at
    f.entity(110, 0, PHYSICAL, "110,0.0,0.0,0.0,1.0,0.0,0.0;");
    // an independent line nothing points at
    f.entity(110, 0, INDEPENDENT, "110,0.0,0.0,0.0,0.0,1.0,0.0;");

    let (_, warnings) = Model::parse(&f.build()).unwrap();
    let orphan_count = warnings
        .iter()
        .filter(|w| matches!(&w.error, Error::InvariantViolation { reason, .. } if reason.contains("orphaned")))
        .count();
    assert_eq!(orphan_count, 1);
}

#[test]
fn write_and_reread_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.igs");

    let mut f = FileBuilder::new();
    let l1 = f.entity(110, 0, PHYSICAL, "110,0.0,0.0,0.0,1.0,0.0,0.0;");
    let l2 = f.entity(110, 0, PHYSICAL, "110,1.0,0.0,0.0,1.0,1.0,0.0;");
    f.entity(102, 0, INDEPENDENT, &format!("102,2,{},{};", l1, l2));

    let (mut model, _) = Model::parse(&f.build()).unwrap();
    model.write(&path, true).unwrap();

    let (model2, warnings) = Model::read(&path).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    assert_eq!(model2.len(), 3);
    assert_eq!(
        model2.entity(model2.entities_of_kind(EntityKind::CompositeCurve)[0])
            .unwrap()
            .core
            .status
            .depends,
        Dependency::Independent
    );
}
