mod support;

use support::{Desk, rect};
use universe::domain::object::Origin;
use universe::domain::ports::DirEntry;
use universe::domain::quality::QualityPreset;
use universe::domain::view::ViewMode;
use universe::use_cases::{SessionEffect, WindowInput};

fn listing(root: &str) -> Vec<DirEntry> {
    ["assets", "docs", "src", "Cargo.toml", "README.md", "main.rs"]
        .iter()
        .map(|name| DirEntry {
            name: name.to_string(),
            path: format!("{root}/{name}"),
            is_directory: Some(!name.contains('.')),
        })
        .collect()
}

fn explore(desk: &mut Desk, label: &str, root: &str) {
    desk.input(label, WindowInput::LoadCity(root.to_string()));
    desk.input(
        label,
        WindowInput::DirectoryListed {
            path: root.to_string(),
            result: Ok(listing(root)),
        },
    );
}

#[test]
fn when_a_city_loads_then_the_player_walks_it_and_peers_see_nothing() {
    let mut desk = Desk::new(&[("a", rect(0, 0)), ("b", rect(600, 0))]);
    explore(&mut desk, "a", "/home/u/project");

    let effects = desk.take_effects();
    assert!(effects.iter().any(|(label, effect)| {
        label == "a" && *effect == SessionEffect::LoadDirectory("/home/u/project".to_string())
    }));

    let a = desk.window("a");
    assert!(a.city().is_loaded());
    assert_eq!(a.city().root(), Some("/home/u/project"));
    assert_eq!(a.viewport().view_mode(), ViewMode::FirstPerson);
    assert!(!a.store().is_empty());
    assert!(!a.field().is_empty());

    // Level objects stay local to the window that built them.
    let b = desk.window("b");
    assert_eq!(b.store().ghost_count(), 0);
}

#[test]
fn when_the_same_seed_builds_a_city_twice_then_layouts_match() {
    let positions = |desk: &Desk| {
        desk.window("a")
            .store()
            .iter()
            .filter(|(key, _)| key.origin == Origin::Local)
            .map(|(key, entry)| (key.id.clone(), entry.object.position))
            .collect::<Vec<_>>()
    };

    let mut first = Desk::new(&[("a", rect(0, 0))]);
    explore(&mut first, "a", "/srv/data");
    let mut second = Desk::new(&[("a", rect(0, 0))]);
    explore(&mut second, "a", "/srv/data");

    let mut left = positions(&first);
    let mut right = positions(&second);
    left.sort_by(|x, y| x.0.cmp(&y.0));
    right.sort_by(|x, y| x.0.cmp(&y.0));
    assert!(!left.is_empty());
    assert_eq!(left, right);
}

#[test]
fn when_quality_changes_then_the_city_keeps_its_objects() {
    let mut desk = Desk::new(&[("a", rect(0, 0))]);
    explore(&mut desk, "a", "/srv/data");
    let before = desk.window("a").store().len();

    desk.input("a", WindowInput::SetQuality(QualityPreset::Low));
    assert_eq!(desk.window("a").store().len(), before);
    assert!(desk.window("a").city().is_loaded());
}
