use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

use rootcause::Report;

use escher_export::EscherError;
use escher_export::export::{self, AxisConvention, ExportOptions, FORMAT_VERSION};
use escher_export::scene::{
    Loop, Material, Mesh, ObjectId, ObjectKind, Polygon, Scene, SceneObject, SceneSource,
    Transform, Vertex,
};

const REMOTE: &str = "escher_remote_space";
const SLOT: &str = "escher_portal_slot";
const SPAWN: &str = "escher_spawn_type";

fn material(name: &str) -> Material {
    Material::builder().name(name).build()
}

/// Flat-shaded mesh; `faces` is `(corner vertex indices, material slot)`.
fn mesh(vertices: &[[f32; 3]], faces: &[(&[u32], usize)], slots: &[&str]) -> Mesh {
    Mesh {
        vertices: vertices
            .iter()
            .map(|&position| Vertex {
                position,
                normal: [0.0, 0.0, 1.0],
            })
            .collect(),
        polygons: faces
            .iter()
            .map(|&(corners, material_index)| Polygon {
                material_index,
                smooth: false,
                normal: [0.0, 0.0, 1.0],
                loops: corners
                    .iter()
                    .map(|&vertex| Loop {
                        vertex,
                        uvs: vec![],
                    })
                    .collect(),
            })
            .collect(),
        uv_layers: vec![],
        materials: slots.iter().map(|s| Some(s.to_string())).collect(),
    }
}

fn cube(slots: &[&str], face_slots: [usize; 6]) -> Mesh {
    let vertices = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    let quads: [&[u32]; 6] = [
        &[0, 3, 2, 1],
        &[4, 5, 6, 7],
        &[0, 1, 5, 4],
        &[1, 2, 6, 5],
        &[2, 3, 7, 6],
        &[3, 0, 4, 7],
    ];
    let faces: Vec<(&[u32], usize)> = quads.into_iter().zip(face_slots).collect();
    mesh(&vertices, &faces, slots)
}

fn triangle() -> Mesh {
    mesh(
        &[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 4.0, 0.0]],
        &[(&[0, 1, 2], 0)],
        &[],
    )
}

fn pso(name: &str, mesh: Mesh) -> SceneObject {
    SceneObject::builder()
        .name(name)
        .kind(ObjectKind::Mesh)
        .mesh(mesh)
        .build()
}

fn path(name: &str, parent: &str, mesh: Mesh) -> SceneObject {
    SceneObject::builder()
        .name(name)
        .kind(ObjectKind::Mesh)
        .parent(parent)
        .mesh(mesh)
        .build()
}

fn anchor(name: &str, parent: &str, translation: [f32; 3]) -> SceneObject {
    SceneObject::builder()
        .name(name)
        .kind(ObjectKind::Empty)
        .parent(parent)
        .transform(Transform {
            translation,
            orientation: [0.0; 3],
        })
        .build()
}

fn remote(name: &str, parent: &str, target: &str, slot: i64) -> SceneObject {
    anchor(name, parent, [0.0, 1.0, 0.0])
        .with_marker(REMOTE, target)
        .with_marker(SLOT, slot)
}

fn spawn(name: &str, parent: &str, spawn_type: &str) -> SceneObject {
    anchor(name, parent, [0.5, 0.5, 0.0]).with_marker(SPAWN, spawn_type)
}

fn export_string(source: &impl SceneSource, options: &ExportOptions) -> String {
    let mut out = Vec::new();
    export::export(source, options, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn export_err(scene: &Scene) -> Report<EscherError> {
    let mut out = Vec::new();
    let err = export::export(scene, &ExportOptions::default(), &mut out).unwrap_err();
    assert!(out.is_empty(), "nothing may be written before validation");
    err
}

/// Two linked spaces with remotes, portal faces and spawns.
fn linked_scene() -> Scene {
    let materials = vec![
        material("Brick"),
        material("EscherPortal"),
        material("EscherPortal1"),
        material("Stone"),
    ];
    let hall = cube(&["Brick", "EscherPortal1"], [0, 0, 0, 1, 0, 0]);
    let attic = cube(&["Stone", "EscherPortal"], [0, 1, 0, 0, 0, 0]);
    let objects = vec![
        pso("PSO_Hall", hall),
        remote("HallToAttic", "PSO_Hall", "Attic", 1),
        remote("Window", "PSO_Hall", "none", 0),
        spawn("Guard", "PSO_Hall", "guard"),
        path("PathO_patrol", "Guard", triangle()),
        pso("PSO_Attic", attic),
        remote("AtticToHall", "PSO_Attic", "PSO_Hall", 0),
        spawn("Rat", "PSO_Attic", "rat"),
    ];
    Scene::new(materials, objects).unwrap()
}

struct SpaceBlock {
    header: Vec<String>,
    remotes: Vec<String>,
    spawns: Vec<String>,
    verts: Vec<String>,
    faces: Vec<String>,
}

impl SpaceBlock {
    fn count(&self, key: &str) -> usize {
        let at = self.header.iter().position(|t| t == key).unwrap();
        self.header[at + 1].parse().unwrap()
    }
}

/// Split an `.esc` body into per-space blocks, checking the top-level layout.
fn parse_spaces(text: &str) -> Vec<SpaceBlock> {
    let mut lines = text.lines().peekable();
    assert_eq!(lines.next(), Some("escher version 6"));
    let nummaterials: usize = lines
        .next()
        .unwrap()
        .strip_prefix("nummaterials ")
        .unwrap()
        .parse()
        .unwrap();
    for ordinal in 0..nummaterials {
        let header = lines.next().unwrap();
        assert!(header.starts_with(&format!("material {ordinal} \"")));
        let numtex: usize = header.rsplit(' ').next().unwrap().parse().unwrap();
        for _ in 0..numtex {
            assert!(lines.next().unwrap().starts_with("texture "));
        }
    }
    let numspaces: usize = lines
        .next()
        .unwrap()
        .strip_prefix("numspaces ")
        .unwrap()
        .parse()
        .unwrap();

    let mut blocks = Vec::new();
    for ordinal in 0..numspaces {
        let header: Vec<String> = lines
            .next()
            .unwrap()
            .split(' ')
            .map(str::to_string)
            .collect();
        assert_eq!(header[0], "space");
        assert_eq!(header[1], ordinal.to_string());
        let mut block = SpaceBlock {
            header,
            remotes: vec![],
            spawns: vec![],
            verts: vec![],
            faces: vec![],
        };
        for (key, kind) in [
            ("numremotes", "remote "),
            ("numspawns", "spawn "),
            ("numverts", "vert "),
            ("numfaces", "face "),
        ] {
            let count = block.count(key);
            let records: Vec<String> = (0..count)
                .map(|_| lines.next().unwrap().to_string())
                .collect();
            for (i, record) in records.iter().enumerate() {
                assert!(
                    record.starts_with(&format!("{kind}{i} ")),
                    "expected {kind}{i}, got {record}"
                );
            }
            match key {
                "numremotes" => block.remotes = records,
                "numspawns" => block.spawns = records,
                "numverts" => block.verts = records,
                _ => block.faces = records,
            }
        }
        blocks.push(block);
    }
    assert_eq!(lines.next(), None, "trailing lines after the last space");
    blocks
}

#[test]
fn single_cube_room() {
    let scene = Scene::new(
        vec![material("Brick")],
        vec![pso("PSO_Room", cube(&["Brick"], [0; 6]))],
    )
    .unwrap();
    let text = export_string(&scene, &ExportOptions::default());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        &lines[..5],
        [
            "escher version 6",
            "nummaterials 1",
            "material 0 \"Brick\" numtex 0",
            "numspaces 1",
            "space 0 numverts 8 numfaces 6 numremotes 0 numspawns 0",
        ]
    );
    assert_eq!(lines.len(), 5 + 8 + 6);
    assert!(lines[5..13].iter().all(|line| line.starts_with("vert ")));
    for (i, line) in lines[13..].iter().enumerate() {
        assert!(line.starts_with(&format!("face {i} mat 0 vdata 4 ")), "{line}");
    }
    // vert 0 is (-1, -1, -1) in editor space, (-1, -1, 1) in engine space.
    assert_eq!(lines[5], "vert 0 -1.000000 -1.000000 1.000000");
    assert_eq!(FORMAT_VERSION, 6);
}

#[test]
fn linked_spaces_resolve_every_reference() {
    let text = export_string(&linked_scene(), &ExportOptions::default());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "nummaterials 2");
    assert_eq!(lines[2], "material 0 \"Brick\" numtex 0");
    assert_eq!(lines[3], "material 1 \"Stone\" numtex 0");

    let spaces = parse_spaces(&text);
    assert_eq!(spaces.len(), 2);

    let hall = &spaces[0];
    assert_eq!(hall.count("numremotes"), 2);
    assert_eq!(hall.count("numspawns"), 1);
    assert!(hall.remotes[0].starts_with("remote 0 space 1 translation "));
    assert!(hall.remotes[1].starts_with("remote 1 space -1 translation "));
    // Face 3 carries EscherPortal1, owned by remote 0.
    assert!(hall.faces[3].starts_with("face 3 remote 0 vdata 4 "));
    assert!(hall.faces[0].starts_with("face 0 mat 0 "));

    let attic = &spaces[1];
    assert_eq!(attic.remotes.len(), 1);
    assert!(attic.remotes[0].starts_with("remote 0 space 0 "));
    assert!(attic.faces[1].starts_with("face 1 remote 0 "));
    assert!(attic.faces[0].starts_with("face 0 mat 1 "));

    for block in &spaces {
        for remote in &block.remotes {
            let target: i64 = remote.split(' ').nth(3).unwrap().parse().unwrap();
            assert!((-1..spaces.len() as i64).contains(&target));
        }
    }
}

#[test]
fn spawn_path_clause() {
    let text = export_string(&linked_scene(), &ExportOptions::default());
    let spaces = parse_spaces(&text);

    let guard = &spaces[0].spawns[0];
    let (head, path) = guard.split_once(" path ").unwrap();
    assert_eq!(
        head,
        "spawn 0 translation 0.500000 0.000000 -0.500000 orientation 0.000000 0.000000 0.000000 params guard"
    );
    let floats: Vec<f32> = path.split(' ').map(|f| f.parse().unwrap()).collect();
    assert_eq!(floats.len(), 3 * 3);
    assert_eq!(&floats[3..6], &[4.0, 0.0, 0.0]);
    assert_eq!(&floats[6..9], &[4.0, 0.0, -4.0]);

    let rat = &spaces[1].spawns[0];
    assert!(rat.ends_with(" params rat"));
    assert!(!rat.contains(" path"));
}

#[test]
fn remote_to_nowhere() {
    let scene = Scene::new(
        vec![material("Brick")],
        vec![
            pso("PSO_A", cube(&["Brick"], [0; 6])),
            remote("Door", "PSO_A", "none", 0),
        ],
    )
    .unwrap();
    let options = ExportOptions::builder()
        .axes(AxisConvention::Identity)
        .build();
    let text = export_string(&scene, &options);
    let spaces = parse_spaces(&text);
    assert_eq!(
        spaces[0].remotes[0],
        "remote 0 space -1 translation 0.000000 1.000000 0.000000 orientation 0.000000 0.000000 0.000000"
    );
}

#[test]
fn export_is_byte_identical_across_runs() {
    let scene = linked_scene();
    let options = ExportOptions::default();
    assert_eq!(
        export_string(&scene, &options),
        export_string(&scene, &options)
    );
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_encoding_matches_sequential() {
    let scene = linked_scene();
    let parallel = ExportOptions::builder().parallel(true).build();
    assert_eq!(
        export_string(&scene, &parallel),
        export_string(&scene, &ExportOptions::default())
    );
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_encoding_reports_the_first_failing_space() {
    let mut objects = Vec::new();
    for i in 0..16 {
        let space = format!("PSO_Room{i}");
        objects.push(pso(&space, cube(&["Brick"], [0; 6])));
        objects.push(remote(&format!("Door{i}"), &space, &format!("Missing{i}"), 0));
    }
    let scene = Scene::new(vec![material("Brick")], objects).unwrap();
    let parallel = ExportOptions::builder().parallel(true).build();

    for _ in 0..8 {
        let mut out = Vec::new();
        let err = export::export(&scene, &parallel, &mut out).unwrap_err();
        assert!(matches!(
            err.current_context(),
            EscherError::Unresolved { name, .. } if name.starts_with("Missing0 ")
        ));
    }
}

#[test]
fn summary_counts() {
    let mut out = Vec::new();
    let summary = export::export(&linked_scene(), &ExportOptions::default(), &mut out).unwrap();
    assert_eq!(summary.materials, 2);
    assert_eq!(summary.spaces, 2);
    assert_eq!(summary.vertices, 16);
    assert_eq!(summary.faces, 12);
    assert_eq!(summary.remotes, 3);
    assert_eq!(summary.spawns, 2);
}

#[test]
fn smooth_faces_use_vertex_normals_and_uvs_are_emitted() {
    let mut mesh = mesh(
        &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        &[(&[0, 1, 2], 0), (&[2, 1, 0], 0)],
        &["Brick"],
    );
    mesh.vertices[0].normal = [1.0, 0.0, 0.0];
    mesh.polygons[1].smooth = true;
    mesh.uv_layers = vec!["UVMap".to_string(), "Lightmap".to_string()];
    for polygon in &mut mesh.polygons {
        for corner in &mut polygon.loops {
            corner.uvs = vec![[0.25, 0.5], [1.0, 0.0]];
        }
    }
    let scene = Scene::new(vec![material("Brick")], vec![pso("PSO_A", mesh)]).unwrap();
    let options = ExportOptions::builder()
        .axes(AxisConvention::Identity)
        .precision(2)
        .build();
    let spaces = parse_spaces(&export_string(&scene, &options));
    let faces = &spaces[0].faces;

    assert_eq!(
        faces[0],
        "face 0 mat 0 vdata 3 \
         0 0.25 0.50 1.00 0.00 0.00 0.00 1.00 \
         1 0.25 0.50 1.00 0.00 0.00 0.00 1.00 \
         2 0.25 0.50 1.00 0.00 0.00 0.00 1.00"
    );
    // Smooth: corner on vertex 0 takes that vertex's normal.
    assert!(faces[1].ends_with(" 0 0.25 0.50 1.00 0.00 1.00 0.00 0.00"));
}

#[cfg(feature = "json")]
#[test]
fn textures_are_listed_per_material() {
    let json = r#"{
        "materials": [
            { "name": "Brick", "textures": [
                { "map": "color", "image_path": "//textures/brick_d.png" },
                { "map": "normal", "image_path": "//textures/brick_n.png" }
            ] }
        ],
        "objects": []
    }"#;
    let scene = Scene::from_json_str(json).unwrap();
    let text = export_string(&scene, &ExportOptions::default());
    assert_eq!(
        text,
        "escher version 6\n\
         nummaterials 1\n\
         material 0 \"Brick\" numtex 2\n\
         texture COLOR brick_d.png\n\
         texture NORMAL brick_n.png\n\
         numspaces 0\n"
    );
}

#[test]
fn duplicate_slot_fails_before_writing() {
    let scene = Scene::new(
        vec![material("Brick")],
        vec![
            pso("PSO_A", cube(&["Brick"], [0; 6])),
            remote("Left", "PSO_A", "none", 0),
            remote("Right", "PSO_A", "none", 0),
        ],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.esc");
    let err = export::export_to_path(&scene, &ExportOptions::default(), &out).unwrap_err();
    assert!(matches!(
        err.current_context(),
        EscherError::DuplicateSlot { slot: 0, first, second, .. } if first == "Left" && second == "Right"
    ));
    assert!(!out.exists());
}

#[test]
fn export_to_path_writes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("linked.esc");
    let scene = linked_scene();
    let summary = export::export_to_path(&scene, &ExportOptions::default(), &out).unwrap();
    assert_eq!(summary.spaces, 2);

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, export_string(&scene, &ExportOptions::default()));
}

#[test]
fn export_to_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("missing").join("a.esc");
    let err = export::export_to_path(&linked_scene(), &ExportOptions::default(), &out).unwrap_err();
    assert!(matches!(err.current_context(), EscherError::Io { .. }));
}

#[test]
fn remote_errors() {
    let with_remote = |remote: SceneObject| {
        Scene::new(
            vec![material("Brick")],
            vec![pso("PSO_A", cube(&["Brick"], [0; 6])), remote],
        )
        .unwrap()
    };

    let unknown_target = with_remote(remote("Door", "PSO_A", "Cellar", 0));
    assert!(matches!(
        export_err(&unknown_target).current_context(),
        EscherError::Unresolved { name, .. } if name.starts_with("Cellar")
    ));

    let no_slot = with_remote(anchor("Door", "PSO_A", [0.0; 3]).with_marker(REMOTE, "none"));
    assert!(matches!(
        export_err(&no_slot).current_context(),
        EscherError::MissingField { name, field } if name == "Door" && field == SLOT
    ));

    let text_slot = with_remote(
        anchor("Door", "PSO_A", [0.0; 3])
            .with_marker(REMOTE, "none")
            .with_marker(SLOT, "two"),
    );
    assert!(matches!(
        export_err(&text_slot).current_context(),
        EscherError::TypeMismatch { expected: "integer", .. }
    ));

    let negative_slot = with_remote(remote("Door", "PSO_A", "none", -1));
    assert!(matches!(
        export_err(&negative_slot).current_context(),
        EscherError::TypeMismatch { .. }
    ));

    let big_slot = with_remote(remote("Door", "PSO_A", "none", 8));
    assert!(matches!(
        export_err(&big_slot).current_context(),
        EscherError::SlotOutOfRange { slot: 8, cap: 8, .. }
    ));

    let numeric_target = with_remote(
        anchor("Door", "PSO_A", [0.0; 3])
            .with_marker(REMOTE, 3_i64)
            .with_marker(SLOT, 0_i64),
    );
    assert!(matches!(
        export_err(&numeric_target).current_context(),
        EscherError::TypeMismatch { expected: "string", .. }
    ));
}

#[test]
fn portal_face_without_remote_is_unresolved() {
    let scene = Scene::new(
        vec![material("Brick"), material("EscherPortal2")],
        vec![pso("PSO_A", cube(&["Brick", "EscherPortal2"], [0, 0, 1, 0, 0, 0]))],
    )
    .unwrap();
    assert!(matches!(
        export_err(&scene).current_context(),
        EscherError::Unresolved { kind: "portal slot", .. }
    ));
}

#[test]
fn face_with_empty_material_slot_is_unresolved() {
    let mut cube = cube(&["Brick"], [0; 6]);
    cube.materials[0] = None;
    let scene = Scene::new(vec![material("Brick")], vec![pso("PSO_A", cube)]).unwrap();
    assert!(matches!(
        export_err(&scene).current_context(),
        EscherError::Unresolved { kind: "material slot", .. }
    ));
}

#[test]
fn corner_uv_count_must_match_layers() {
    let mut cube = cube(&["Brick"], [0; 6]);
    cube.uv_layers = vec!["UVMap".to_string()];
    let scene = Scene::new(vec![material("Brick")], vec![pso("PSO_A", cube)]).unwrap();
    assert!(matches!(
        export_err(&scene).current_context(),
        EscherError::InvalidGeometry { .. }
    ));
}

#[test]
fn anchors_outside_a_space_fail_the_export() {
    let orphan = |name: &str| {
        SceneObject::builder()
            .name(name)
            .kind(ObjectKind::Empty)
            .build()
    };
    let with = |extra: Vec<SceneObject>| {
        let mut objects = vec![pso("PSO_A", cube(&["Brick"], [0; 6]))];
        objects.extend(extra);
        Scene::new(vec![material("Brick")], objects).unwrap()
    };

    let lost_door = with(vec![
        orphan("LostDoor")
            .with_marker(REMOTE, "none")
            .with_marker(SLOT, 0_i64),
    ]);
    assert!(matches!(
        export_err(&lost_door).current_context(),
        EscherError::TypeMismatch { name, .. } if name == "LostDoor"
    ));

    let nested_door = with(vec![
        path("Prop", "PSO_A", triangle()),
        remote("NestedDoor", "Prop", "Nowhere", 0),
    ]);
    assert!(matches!(
        export_err(&nested_door).current_context(),
        EscherError::TypeMismatch { name, found, .. }
            if name == "NestedDoor" && found.contains("'Prop'")
    ));

    let lost_guard = with(vec![orphan("LostGuard").with_marker(SPAWN, "guard")]);
    assert!(matches!(
        export_err(&lost_guard).current_context(),
        EscherError::TypeMismatch { name, .. } if name == "LostGuard"
    ));

    let stray_path = with(vec![path("PathO_patrol", "PSO_A", triangle())]);
    assert!(matches!(
        export_err(&stray_path).current_context(),
        EscherError::TypeMismatch { name, .. } if name == "PathO_patrol"
    ));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("lost.esc");
    assert!(export::export_to_path(&lost_guard, &ExportOptions::default(), &out).is_err());
    assert!(!out.exists());
}

#[test]
fn values_rounding_to_zero_print_unsigned() {
    let mut tiny = mesh(
        &[[0.0, 1e-9, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
        &[(&[0, 1, 2], 0)],
        &["Brick"],
    );
    tiny.polygons[0].normal = [0.0, 1e-9, 1.0];
    let scene = Scene::new(vec![material("Brick")], vec![pso("PSO_A", tiny)]).unwrap();
    let text = export_string(&scene, &ExportOptions::default());

    assert!(!text.contains("-0.000000"), "{text}");
    let spaces = parse_spaces(&text);
    assert_eq!(spaces[0].verts[0], "vert 0 0.000000 0.000000 0.000000");
    assert!(
        spaces[0].faces[0].starts_with("face 0 mat 0 vdata 3 0 0.000000 1.000000 0.000000 ")
    );
}

#[test]
fn spawn_errors() {
    let with = |extra: Vec<SceneObject>| {
        let mut objects = vec![pso("PSO_A", cube(&["Brick"], [0; 6]))];
        objects.extend(extra);
        Scene::new(vec![material("Brick")], objects).unwrap()
    };

    let two_paths = with(vec![
        spawn("Guard", "PSO_A", "guard"),
        path("PathO_a", "Guard", triangle()),
        path("PathO_b", "Guard", triangle()),
    ]);
    assert!(matches!(
        export_err(&two_paths).current_context(),
        EscherError::MultiplePaths { spawn, count: 2 } if spawn == "Guard"
    ));

    let mut square = triangle();
    square.polygons.push(square.polygons[0].clone());
    let two_polygon_path = with(vec![
        spawn("Guard", "PSO_A", "guard"),
        path("PathO_a", "Guard", square),
    ]);
    assert!(matches!(
        export_err(&two_polygon_path).current_context(),
        EscherError::InvalidGeometry { name, .. } if name == "PathO_a"
    ));

    let untyped = with(vec![anchor("SpawnO_guard", "PSO_A", [0.0; 3])]);
    assert!(matches!(
        export_err(&untyped).current_context(),
        EscherError::MissingField { field, .. } if field == SPAWN
    ));

    let spaced = with(vec![spawn("Guard", "PSO_A", "big guard")]);
    assert!(matches!(
        export_err(&spaced).current_context(),
        EscherError::InvalidName { .. }
    ));

    let empty_path = with(vec![
        spawn("Guard", "PSO_A", "guard"),
        anchor("PathO_a", "Guard", [0.0; 3]),
    ]);
    assert!(matches!(
        export_err(&empty_path).current_context(),
        EscherError::TypeMismatch { name, .. } if name == "PathO_a"
    ));
}

/// Wraps a [`Scene`] and counts derived-mesh handouts.
struct CountingSource {
    scene: Scene,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl SceneSource for CountingSource {
    fn materials(&self) -> &[Material] {
        self.scene.materials()
    }

    fn objects(&self) -> &[SceneObject] {
        self.scene.objects()
    }

    fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.scene.children(id)
    }

    fn acquire_mesh(&self, id: ObjectId) -> Option<Cow<'_, Mesh>> {
        let mesh = self.scene.acquire_mesh(id)?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Some(mesh)
    }

    fn release_mesh(&self, _id: ObjectId) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting(scene: Scene) -> CountingSource {
    CountingSource {
        scene,
        acquired: AtomicUsize::new(0),
        released: AtomicUsize::new(0),
    }
}

#[test]
fn derived_meshes_are_released_after_success() {
    let source = counting(linked_scene());
    let expected = export_string(&linked_scene(), &ExportOptions::default());
    assert_eq!(export_string(&source, &ExportOptions::default()), expected);

    // Two spaces and one path.
    assert_eq!(source.acquired.load(Ordering::SeqCst), 3);
    assert_eq!(source.released.load(Ordering::SeqCst), 3);
}

#[test]
fn derived_meshes_are_released_on_error() {
    let mut square = triangle();
    square.polygons.push(square.polygons[0].clone());
    let scene = Scene::new(
        vec![material("Brick")],
        vec![
            pso("PSO_A", cube(&["Brick"], [0; 6])),
            spawn("Guard", "PSO_A", "guard"),
            path("PathO_a", "Guard", square),
        ],
    )
    .unwrap();
    let source = counting(scene);

    let mut out = Vec::new();
    assert!(export::export(&source, &ExportOptions::default(), &mut out).is_err());
    assert_eq!(source.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(source.released.load(Ordering::SeqCst), 1);
}
