use spratlayout_core::model::{Layout, Sprite, Trim};
use spratlayout_core::{SpratError, format_layout, parse_layout, to_json, to_json_hash};

fn sample(trim: bool) -> Layout {
    let mut a = Sprite::new("ui/button.png", 32, 16);
    a.x = 0;
    a.y = 0;
    let mut b = Sprite::new("odd \"name\" \\ dir/x.png", 8, 8);
    b.x = 34;
    b.y = 0;
    if trim {
        a.trim = Trim::new(1, 2, 3, 4);
    }
    Layout {
        width: 42,
        height: 16,
        scale: 0.5,
        trim,
        sprites: vec![a, b],
    }
}

#[test]
fn format_matches_expected_lines() {
    let text = format_layout(&sample(false));
    let expected = "atlas 42,16\nscale 0.5\nsprite \"ui/button.png\" 0,0 32,16\nsprite \"odd \\\"name\\\" \\\\ dir/x.png\" 34,0 8,8\n";
    assert_eq!(text, expected);
}

#[test]
fn round_trip_with_and_without_trim() {
    for trim in [false, true] {
        let layout = sample(trim);
        let text = layout.to_string();
        let parsed: Layout = text.parse().unwrap();
        assert_eq!(parsed, layout);
        assert_eq!(format_layout(&parsed), text);
    }
}

#[test]
fn trim_fields_only_when_trimming() {
    let text = format_layout(&sample(true));
    assert!(text.contains("sprite \"ui/button.png\" 0,0 32,16 1,2 3,4\n"));
    assert!(!format_layout(&sample(false)).contains(" 0,0 0,0"));
}

#[test]
fn legacy_atlas_and_blank_lines_accepted() {
    let text = "atlas 64 32\n\nsprite \"a\" 0,0 10,10\n\n";
    let layout = parse_layout(text).unwrap();
    assert_eq!((layout.width, layout.height), (64, 32));
    assert_eq!(layout.scale, 1.0);
    assert!(!layout.trim);
    assert_eq!(layout.sprites.len(), 1);
}

#[test]
fn errors_carry_line_numbers() {
    let cases = [
        ("atlas 10,10\nscale 1\nscale 2\n", 3),
        ("atlas 10,10\natlas 10,10\n", 2),
        ("atlas 10,10\nscale 0\n", 2),
        ("atlas 10,10\nscale -1\n", 2),
        ("atlas 10,10\nscale nan\n", 2),
        ("atlas 10,x\n", 1),
        ("atlas 10,10\nsprite a.png 0,0 1,1\n", 2),
        ("atlas 10,10\nsprite \"a.png 0,0 1,1\n", 2),
        ("atlas 10,10\nsprite \"a\" 0,0 1,1 0,0 0,0\nsprite \"b\" 0,0 1,1\n", 3),
        ("atlas 10,10\nsprite \"a\" 0,0\n", 2),
        ("atlas 10,10\nbogus 1\n", 2),
    ];
    for (text, line) in cases {
        let err = parse_layout(text).unwrap_err();
        assert_eq!(err.line, line, "wrong line for {text:?}: {err}");
    }
}

#[test]
fn missing_atlas_is_an_error() {
    let err = parse_layout("scale 1\n").unwrap_err();
    assert!(err.message.contains("atlas"));
    let wrapped: SpratError = err.into();
    assert!(matches!(wrapped, SpratError::Parse(_)));
}

#[test]
fn json_mirrors_text_fields() {
    let v = to_json(&sample(true));
    assert_eq!(v["atlas"]["w"], 42);
    assert_eq!(v["scale"], 0.5);
    assert_eq!(v["sprites"][0]["path"], "ui/button.png");
    assert_eq!(v["sprites"][0]["trim"]["bottom"], 4);
    assert_eq!(v["sprites"][1]["x"], 34);

    let plain = to_json(&sample(false));
    assert!(plain["sprites"][0].get("trim").is_none());
}

#[test]
fn json_hash_keys_sprites_by_path() {
    let v = to_json_hash(&sample(true));
    assert_eq!(v["atlas"]["h"], 16);
    let sprites = v["sprites"].as_object().unwrap();
    assert_eq!(sprites.len(), 2);
    assert_eq!(sprites["ui/button.png"]["w"], 32);
    assert_eq!(sprites["ui/button.png"]["trim"]["left"], 1);
    assert_eq!(sprites["odd \"name\" \\ dir/x.png"]["x"], 34);
    assert!(sprites["ui/button.png"].get("path").is_none());

    let plain = to_json_hash(&sample(false));
    assert!(plain["sprites"]["ui/button.png"].get("trim").is_none());
}
