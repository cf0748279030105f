// ═══════════════════════════════════════════════════════════════════════
// Static map data — territories, sectors, spice fields and adjacency.
// All properties here never change during a game; the storm position and
// force stacks live in GameState.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::types::Faction;

/// The board is a wheel of 18 storm sectors. The storm marker sits on one
/// of them and advances counter-clockwise (ascending sector number).
pub const NUM_SECTORS: u8 = 18;

/// Index into the static LOCATIONS table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub u8);

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", location_name(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Stronghold,
    Sand,
    Rock,
    PolarSink,
}

/// Static description of a territory (compile-time constant).
#[derive(Debug, Clone)]
pub struct LocationDef {
    pub id: LocationId,
    pub name: &'static str,
    pub terrain: Terrain,
    /// Storm sectors this territory spans, in wheel order.
    pub sectors: &'static [u8],
    /// Sector where spice blows land, if this is a spice territory.
    pub spice_sector: Option<u8>,
    pub adjacent: &'static [LocationId],
}

impl LocationDef {
    /// Fortified territories hold at most two factions' combat forces.
    pub fn fortified(&self) -> bool {
        self.terrain == Terrain::Stronghold
    }

    /// Forces on sand are exposed to the storm; rock and walls shelter.
    pub fn storm_vulnerable(&self) -> bool {
        self.terrain == Terrain::Sand
    }
}

// ── Location ID constants ──────────────────────────────────────────────
// Ordered: strongholds (0–4), the polar sink (5), open terrain (6–26).

pub const ARRAKEEN: LocationId          = LocationId(0);
pub const CARTHAG: LocationId           = LocationId(1);
pub const SIETCH_TABR: LocationId       = LocationId(2);
pub const HABBANYA_SIETCH: LocationId   = LocationId(3);
pub const TUEKS_SIETCH: LocationId      = LocationId(4);
pub const POLAR_SINK: LocationId        = LocationId(5);
pub const IMPERIAL_BASIN: LocationId    = LocationId(6);
pub const CIELAGO_NORTH: LocationId     = LocationId(7);
pub const CIELAGO_SOUTH: LocationId     = LocationId(8);
pub const SOUTH_MESA: LocationId        = LocationId(9);
pub const RED_CHASM: LocationId         = LocationId(10);
pub const THE_MINOR_ERG: LocationId     = LocationId(11);
pub const PASTY_MESA: LocationId        = LocationId(12);
pub const SHIELD_WALL: LocationId       = LocationId(13);
pub const SIHAYA_RIDGE: LocationId      = LocationId(14);
pub const OLD_GAP: LocationId           = LocationId(15);
pub const BROKEN_LAND: LocationId       = LocationId(16);
pub const HAGGA_BASIN: LocationId       = LocationId(17);
pub const ROCK_OUTCROPPINGS: LocationId = LocationId(18);
pub const WIND_PASS: LocationId         = LocationId(19);
pub const THE_GREAT_FLAT: LocationId    = LocationId(20);
pub const FUNERAL_PLAIN: LocationId     = LocationId(21);
pub const HABBANYA_ERG: LocationId      = LocationId(22);
pub const FALSE_WALL_SOUTH: LocationId  = LocationId(23);
pub const FALSE_WALL_WEST: LocationId   = LocationId(24);
pub const WIND_PASS_NORTH: LocationId   = LocationId(25);
pub const CIELAGO_WEST: LocationId      = LocationId(26);

pub const NUM_LOCATIONS: usize = 27;

/// The five stronghold territories that decide victory.
pub const STRONGHOLDS: [LocationId; 5] =
    [ARRAKEEN, CARTHAG, SIETCH_TABR, HABBANYA_SIETCH, TUEKS_SIETCH];

pub fn location(id: LocationId) -> &'static LocationDef {
    &LOCATIONS[id.0 as usize]
}

pub fn location_name(id: LocationId) -> &'static str {
    LOCATIONS[id.0 as usize].name
}

// ── Static territory definitions ───────────────────────────────────────

macro_rules! stronghold {
    ($name:expr, $id:expr, sectors: [$($s:expr),*], adj: [$($a:expr),*]) => {
        LocationDef {
            id: $id, name: $name, terrain: Terrain::Stronghold,
            sectors: &[$($s),*], spice_sector: None, adjacent: &[$($a),*],
        }
    };
}

macro_rules! sand {
    ($name:expr, $id:expr, sectors: [$($s:expr),*], spice: $sp:expr, adj: [$($a:expr),*]) => {
        LocationDef {
            id: $id, name: $name, terrain: Terrain::Sand,
            sectors: &[$($s),*], spice_sector: $sp, adjacent: &[$($a),*],
        }
    };
}

macro_rules! rock {
    ($name:expr, $id:expr, terrain: $t:expr, sectors: [$($s:expr),*], adj: [$($a:expr),*]) => {
        LocationDef {
            id: $id, name: $name, terrain: $t,
            sectors: &[$($s),*], spice_sector: None, adjacent: &[$($a),*],
        }
    };
}

pub static LOCATIONS: [LocationDef; NUM_LOCATIONS] = [
    // 0: Arrakeen
    stronghold!("Arrakeen", ARRAKEEN, sectors: [9],
        adj: [IMPERIAL_BASIN, OLD_GAP, POLAR_SINK]),
    // 1: Carthag
    stronghold!("Carthag", CARTHAG, sectors: [10],
        adj: [IMPERIAL_BASIN, OLD_GAP, BROKEN_LAND, POLAR_SINK]),
    // 2: Sietch Tabr
    stronghold!("Sietch Tabr", SIETCH_TABR, sectors: [13],
        adj: [ROCK_OUTCROPPINGS, WIND_PASS, POLAR_SINK]),
    // 3: Habbanya Sietch
    stronghold!("Habbanya Sietch", HABBANYA_SIETCH, sectors: [16],
        adj: [HABBANYA_ERG, FALSE_WALL_WEST]),
    // 4: Tuek's Sietch
    stronghold!("Tuek's Sietch", TUEKS_SIETCH, sectors: [4],
        adj: [SOUTH_MESA, FALSE_WALL_SOUTH, PASTY_MESA]),
    // 5: Polar Sink
    rock!("Polar Sink", POLAR_SINK, terrain: Terrain::PolarSink, sectors: [0],
        adj: [ARRAKEEN, CARTHAG, SIETCH_TABR, IMPERIAL_BASIN, CIELAGO_NORTH,
              THE_MINOR_ERG, SHIELD_WALL, HAGGA_BASIN, WIND_PASS, WIND_PASS_NORTH]),
    // 6: Imperial Basin
    sand!("Imperial Basin", IMPERIAL_BASIN, sectors: [8, 9, 10], spice: None,
        adj: [ARRAKEEN, CARTHAG, OLD_GAP, SHIELD_WALL, SIHAYA_RIDGE, POLAR_SINK]),
    // 7: Cielago North
    sand!("Cielago North", CIELAGO_NORTH, sectors: [0, 1, 2], spice: Some(1),
        adj: [CIELAGO_WEST, CIELAGO_SOUTH, FALSE_WALL_SOUTH, POLAR_SINK]),
    // 8: Cielago South
    sand!("Cielago South", CIELAGO_SOUTH, sectors: [1, 2], spice: Some(1),
        adj: [CIELAGO_NORTH, CIELAGO_WEST, FALSE_WALL_SOUTH]),
    // 9: South Mesa
    sand!("South Mesa", SOUTH_MESA, sectors: [3, 4, 5], spice: Some(4),
        adj: [TUEKS_SIETCH, FALSE_WALL_SOUTH, PASTY_MESA, RED_CHASM]),
    // 10: Red Chasm
    sand!("Red Chasm", RED_CHASM, sectors: [6], spice: Some(6),
        adj: [SOUTH_MESA, PASTY_MESA, THE_MINOR_ERG]),
    // 11: The Minor Erg
    sand!("The Minor Erg", THE_MINOR_ERG, sectors: [6, 7], spice: Some(7),
        adj: [RED_CHASM, PASTY_MESA, SHIELD_WALL, POLAR_SINK]),
    // 12: Pasty Mesa
    rock!("Pasty Mesa", PASTY_MESA, terrain: Terrain::Rock, sectors: [4, 5, 6, 7],
        adj: [TUEKS_SIETCH, FALSE_WALL_SOUTH, SOUTH_MESA, RED_CHASM, THE_MINOR_ERG, SHIELD_WALL]),
    // 13: Shield Wall
    rock!("Shield Wall", SHIELD_WALL, terrain: Terrain::Rock, sectors: [7, 8],
        adj: [PASTY_MESA, THE_MINOR_ERG, IMPERIAL_BASIN, SIHAYA_RIDGE, POLAR_SINK]),
    // 14: Sihaya Ridge
    sand!("Sihaya Ridge", SIHAYA_RIDGE, sectors: [8], spice: Some(8),
        adj: [SHIELD_WALL, OLD_GAP, IMPERIAL_BASIN]),
    // 15: Old Gap
    sand!("Old Gap", OLD_GAP, sectors: [8, 9, 10], spice: Some(9),
        adj: [ARRAKEEN, CARTHAG, IMPERIAL_BASIN, SIHAYA_RIDGE, BROKEN_LAND]),
    // 16: Broken Land
    sand!("Broken Land", BROKEN_LAND, sectors: [10, 11], spice: Some(11),
        adj: [CARTHAG, OLD_GAP, HAGGA_BASIN, ROCK_OUTCROPPINGS]),
    // 17: Hagga Basin
    sand!("Hagga Basin", HAGGA_BASIN, sectors: [11, 12], spice: Some(12),
        adj: [BROKEN_LAND, ROCK_OUTCROPPINGS, POLAR_SINK]),
    // 18: Rock Outcroppings
    rock!("Rock Outcroppings", ROCK_OUTCROPPINGS, terrain: Terrain::Rock, sectors: [12, 13],
        adj: [SIETCH_TABR, BROKEN_LAND, HAGGA_BASIN, WIND_PASS]),
    // 19: Wind Pass
    sand!("Wind Pass", WIND_PASS, sectors: [13, 14], spice: None,
        adj: [SIETCH_TABR, ROCK_OUTCROPPINGS, THE_GREAT_FLAT, FUNERAL_PLAIN,
              WIND_PASS_NORTH, POLAR_SINK]),
    // 20: The Great Flat
    sand!("The Great Flat", THE_GREAT_FLAT, sectors: [14], spice: Some(14),
        adj: [WIND_PASS, FUNERAL_PLAIN, FALSE_WALL_WEST]),
    // 21: Funeral Plain
    sand!("Funeral Plain", FUNERAL_PLAIN, sectors: [14, 15], spice: Some(15),
        adj: [WIND_PASS, THE_GREAT_FLAT, HABBANYA_ERG, FALSE_WALL_WEST]),
    // 22: Habbanya Erg
    sand!("Habbanya Erg", HABBANYA_ERG, sectors: [15, 16], spice: Some(15),
        adj: [FUNERAL_PLAIN, HABBANYA_SIETCH, FALSE_WALL_WEST]),
    // 23: False Wall South
    rock!("False Wall South", FALSE_WALL_SOUTH, terrain: Terrain::Rock, sectors: [3, 4],
        adj: [TUEKS_SIETCH, CIELAGO_NORTH, CIELAGO_SOUTH, SOUTH_MESA, PASTY_MESA]),
    // 24: False Wall West
    rock!("False Wall West", FALSE_WALL_WEST, terrain: Terrain::Rock, sectors: [15, 16, 17],
        adj: [HABBANYA_SIETCH, THE_GREAT_FLAT, FUNERAL_PLAIN, HABBANYA_ERG,
              WIND_PASS_NORTH, CIELAGO_WEST]),
    // 25: Wind Pass North
    sand!("Wind Pass North", WIND_PASS_NORTH, sectors: [16, 17], spice: Some(16),
        adj: [WIND_PASS, FALSE_WALL_WEST, CIELAGO_WEST, POLAR_SINK]),
    // 26: Cielago West
    sand!("Cielago West", CIELAGO_WEST, sectors: [17, 0], spice: None,
        adj: [CIELAGO_NORTH, CIELAGO_SOUTH, FALSE_WALL_WEST, WIND_PASS_NORTH]),
];

// ── Spice blow amounts ─────────────────────────────────────────────────

/// How much spice a territory's blow card delivers.
pub fn spice_blow_amount(id: LocationId) -> u8 {
    match id {
        CIELAGO_NORTH => 8,
        CIELAGO_SOUTH => 12,
        SOUTH_MESA => 10,
        RED_CHASM => 8,
        THE_MINOR_ERG => 8,
        SIHAYA_RIDGE => 6,
        OLD_GAP => 6,
        BROKEN_LAND => 8,
        HAGGA_BASIN => 6,
        THE_GREAT_FLAT => 10,
        FUNERAL_PLAIN => 8,
        HABBANYA_ERG => 8,
        WIND_PASS_NORTH => 6,
        _ => 0,
    }
}

// ── Player seats and storm order ───────────────────────────────────────

/// Fixed seat sector for each faction's shield marker on the wheel rim.
pub fn seat_sector(f: Faction) -> u8 {
    match f {
        Faction::Atreides => 9,
        Faction::Harkonnen => 10,
        Faction::Emperor => 1,
        Faction::SpacingGuild => 4,
        Faction::BeneGesserit => 16,
        Faction::Fremen => 13,
    }
}

/// Global turn order: factions sorted by distance of their seat from the
/// storm, counter-clockwise. The faction the storm will next approach
/// acts first.
pub fn storm_order(storm_sector: u8) -> Vec<Faction> {
    let mut order = Faction::ALL.to_vec();
    order.sort_by_key(|&f| {
        (i16::from(seat_sector(f)) - i16::from(storm_sector)).rem_euclid(i16::from(NUM_SECTORS))
    });
    order
}

// ── Storm partitioning ─────────────────────────────────────────────────

/// Split a territory's sectors into battle groups separated by the storm.
/// Sectors on either side of the storm sector cannot fight each other;
/// forces inside the storm sector itself form their own group.
pub fn battle_groups(def: &LocationDef, storm_sector: u8) -> Vec<Vec<u8>> {
    if !def.sectors.contains(&storm_sector) {
        return vec![def.sectors.to_vec()];
    }
    let mut groups: Vec<Vec<u8>> = Vec::new();
    let mut run: Vec<u8> = Vec::new();
    for &s in def.sectors {
        if s == storm_sector {
            if !run.is_empty() {
                groups.push(std::mem::take(&mut run));
            }
            groups.push(vec![s]);
        } else {
            run.push(s);
        }
    }
    if !run.is_empty() {
        groups.push(run);
    }
    groups
}
