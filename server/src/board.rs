//! Randomized board and harbor layout, generated once per room.
//!
//! Both generators take the random source as a parameter so tests can seed
//! it; the registry feeds them from its own entropy-seeded generator.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{HexTile, Material, Port, PortRatio, Resource};

/// Axial radius of the hex grid.
pub const BOARD_RADIUS: i32 = 2;
/// Distance from a tile's center to a corner, in layout units.
pub const TILE_SIZE: f64 = 40.0;
pub const TILE_COUNT: usize = 19;
pub const DESERT_COUNT: usize = 2;
/// Resource cards of each kind in the material pool.
pub const MATERIAL_COPIES: usize = 7;

pub const GENERIC_PORTS: usize = 2;
pub const EXTRA_RESOURCE_PORTS: usize = 5;

/// Roll numbers and how many tokens carry each; seven never appears.
pub const ROLL_FREQUENCIES: [(u8, usize); 10] = [
    (2, 1),
    (3, 3),
    (4, 4),
    (5, 4),
    (6, 5),
    (8, 5),
    (9, 4),
    (10, 3),
    (11, 2),
    (12, 1),
];

/// Fixed harbor anchor points around the island.
pub const PORT_POSITIONS: [(f64, f64); 12] = [
    (340.0, 90.0),
    (460.0, 90.0),
    (600.0, 160.0),
    (670.0, 280.0),
    (670.0, 420.0),
    (130.0, 280.0),
    (130.0, 420.0),
    (600.0, 530.0),
    (200.0, 540.0),
    (200.0, 160.0),
    (330.0, 600.0),
    (470.0, 600.0),
];

/// Expands the frequency table into the full token pool.
pub fn roll_number_pool() -> Vec<u8> {
    ROLL_FREQUENCIES
        .iter()
        .flat_map(|&(number, count)| std::iter::repeat(number).take(count))
        .collect()
}

/// Draws the resource tiles from the shuffled card pool and mixes in the deserts.
fn material_pool<R: Rng + ?Sized>(rng: &mut R) -> Vec<Material> {
    let mut resources: Vec<Material> = Resource::ALL
        .iter()
        .flat_map(|&resource| std::iter::repeat(Material::from(resource)).take(MATERIAL_COPIES))
        .collect();
    resources.shuffle(rng);
    resources.truncate(TILE_COUNT - DESERT_COUNT);

    resources.extend(std::iter::repeat(Material::Desert).take(DESERT_COUNT));
    resources.shuffle(rng);
    resources
}

/// Flat-top projection of an axial coordinate onto the plane.
pub fn axial_to_pixel(q: i32, r: i32) -> (f64, f64) {
    let x = TILE_SIZE * 1.5 * q as f64;
    let y = TILE_SIZE * 3f64.sqrt() * (r as f64 + q as f64 / 2.0);
    (x, y)
}

/// Generates the 19-tile board.
///
/// Tiles are emitted column by column (`q` outer, `r` inner) and numbered in
/// that order. Desert tiles never carry a roll number. Should a pool run dry
/// the tile degrades to a desert or to no roll number rather than failing.
pub fn generate_board<R: Rng + ?Sized>(rng: &mut R) -> Vec<HexTile> {
    let mut materials = material_pool(rng);
    let mut rolls = roll_number_pool();
    rolls.shuffle(rng);

    let mut tiles = Vec::with_capacity(TILE_COUNT);
    let mut id = 0;

    for q in -BOARD_RADIUS..=BOARD_RADIUS {
        let r1 = (-BOARD_RADIUS).max(-q - BOARD_RADIUS);
        let r2 = BOARD_RADIUS.min(-q + BOARD_RADIUS);
        for r in r1..=r2 {
            let material = materials.pop().unwrap_or(Material::Desert);
            let roll_number = match material {
                Material::Desert => None,
                _ => rolls.pop(),
            };
            let (x, y) = axial_to_pixel(q, r);

            tiles.push(HexTile {
                id,
                material,
                roll_number,
                x,
                y,
            });
            id += 1;
        }
    }

    tiles
}

/// Generates the 12 harbors.
///
/// Two are generic 3:1 harbors; the other ten are 2:1 harbors covering every
/// resource once plus five resources picked with replacement. Harbor data and
/// anchor points are shuffled independently before being paired.
pub fn generate_ports<R: Rng + ?Sized>(rng: &mut R) -> Vec<Port> {
    let mut resources: Vec<Resource> = Resource::ALL.to_vec();
    for _ in 0..EXTRA_RESOURCE_PORTS {
        resources.push(Resource::ALL[rng.gen_range(0..Resource::ALL.len())]);
    }

    let mut port_data: Vec<(PortRatio, Option<Resource>)> =
        vec![(PortRatio::ThreeToOne, None); GENERIC_PORTS];
    port_data.extend(
        resources
            .into_iter()
            .map(|resource| (PortRatio::TwoToOne, Some(resource))),
    );
    port_data.shuffle(rng);

    let mut positions = PORT_POSITIONS.to_vec();
    positions.shuffle(rng);

    positions
        .into_iter()
        .zip(port_data)
        .map(|((x, y), (ratio, resource))| Port {
            x,
            y,
            ratio,
            resource,
        })
        .collect()
}
