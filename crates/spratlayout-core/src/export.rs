use crate::model::{Layout, Sprite};
use serde_json::{Map, Value, json};

fn sprite_fields(s: &Sprite, trim: bool) -> Value {
    let mut v = json!({
        "x": s.x,
        "y": s.y,
        "w": s.w,
        "h": s.h,
    });
    if trim {
        v["trim"] = json!({
            "left": s.trim.left,
            "top": s.trim.top,
            "right": s.trim.right,
            "bottom": s.trim.bottom,
        });
    }
    v
}

/// Serialize a `Layout` as `{ atlas, scale, trim, sprites: [ { path, x, y, w, h, trim? } ] }`.
/// Mirrors the text format: sprites in path order, trim offsets only when trimming was on.
pub fn to_json(layout: &Layout) -> Value {
    let sprites: Vec<Value> = layout
        .sprites
        .iter()
        .map(|s| {
            let mut v = sprite_fields(s, layout.trim);
            v["path"] = json!(s.path);
            v
        })
        .collect();
    json!({
        "atlas": { "w": layout.width, "h": layout.height },
        "scale": layout.scale,
        "trim": layout.trim,
        "sprites": sprites,
    })
}

/// Same data keyed by sprite path: `{ atlas, scale, trim, sprites: { path: { x, y, w, h, trim? } } }`.
pub fn to_json_hash(layout: &Layout) -> Value {
    let mut sprites = Map::new();
    for s in &layout.sprites {
        sprites.insert(s.path.clone(), sprite_fields(s, layout.trim));
    }
    json!({
        "atlas": { "w": layout.width, "h": layout.height },
        "scale": layout.scale,
        "trim": layout.trim,
        "sprites": Value::Object(sprites),
    })
}
