// ═══════════════════════════════════════════════════════════════════════
// Static card data — leader roster, treachery deck and spice deck
// compositions. Shuffling happens in setup; this module is pure data.
// ═══════════════════════════════════════════════════════════════════════

use crate::map;
use crate::types::{CardKind, Faction, LeaderId, SpiceCard};

/// Static description of a leader disc.
#[derive(Debug, Clone)]
pub struct LeaderDef {
    pub id: LeaderId,
    pub faction: Faction,
    pub name: &'static str,
    pub strength: u8,
}

macro_rules! leader {
    ($id:expr, $f:expr, $name:expr, $s:expr) => {
        LeaderDef { id: LeaderId($id), faction: $f, name: $name, strength: $s }
    };
}

pub const NUM_LEADERS: usize = 30;

/// Five leaders per faction, ordered by faction then ascending strength.
pub static LEADERS: [LeaderDef; NUM_LEADERS] = [
    // Atreides
    leader!(0, Faction::Atreides, "Dr. Wellington Yueh", 1),
    leader!(1, Faction::Atreides, "Duncan Idaho", 2),
    leader!(2, Faction::Atreides, "Gurney Halleck", 4),
    leader!(3, Faction::Atreides, "Lady Jessica", 5),
    leader!(4, Faction::Atreides, "Thufir Hawat", 5),
    // Harkonnen
    leader!(5, Faction::Harkonnen, "Umman Kudu", 1),
    leader!(6, Faction::Harkonnen, "Captain Iakin Nefud", 2),
    leader!(7, Faction::Harkonnen, "Piter de Vries", 3),
    leader!(8, Faction::Harkonnen, "Beast Rabban", 4),
    leader!(9, Faction::Harkonnen, "Feyd-Rautha", 6),
    // Emperor
    leader!(10, Faction::Emperor, "Bashar", 2),
    leader!(11, Faction::Emperor, "Burseg", 3),
    leader!(12, Faction::Emperor, "Caid", 3),
    leader!(13, Faction::Emperor, "Captain Aramsham", 5),
    leader!(14, Faction::Emperor, "Count Hasimir Fenring", 6),
    // Spacing Guild
    leader!(15, Faction::SpacingGuild, "Guild Representative", 1),
    leader!(16, Faction::SpacingGuild, "Soo-Soo Sook", 2),
    leader!(17, Faction::SpacingGuild, "Master Bewt", 3),
    leader!(18, Faction::SpacingGuild, "Esmar Tuek", 3),
    leader!(19, Faction::SpacingGuild, "Staban Tuek", 5),
    // Bene Gesserit
    leader!(20, Faction::BeneGesserit, "Alia", 5),
    leader!(21, Faction::BeneGesserit, "Margot Lady Fenring", 5),
    leader!(22, Faction::BeneGesserit, "Princess Irulan", 5),
    leader!(23, Faction::BeneGesserit, "Mother Ramallo", 5),
    leader!(24, Faction::BeneGesserit, "Wanna Yueh", 5),
    // Fremen
    leader!(25, Faction::Fremen, "Jamis", 2),
    leader!(26, Faction::Fremen, "Shadout Mapes", 3),
    leader!(27, Faction::Fremen, "Otheym", 5),
    leader!(28, Faction::Fremen, "Chani", 6),
    leader!(29, Faction::Fremen, "Stilgar", 7),
];

pub fn leader(id: LeaderId) -> &'static LeaderDef {
    &LEADERS[id.0 as usize]
}

pub fn faction_leaders(f: Faction) -> Vec<LeaderId> {
    LEADERS.iter().filter(|l| l.faction == f).map(|l| l.id).collect()
}

/// The unshuffled treachery deck: 22 cards.
pub fn treachery_deck() -> Vec<CardKind> {
    let mut deck = Vec::with_capacity(22);
    deck.push(CardKind::Lasgun);
    for _ in 0..4 {
        deck.push(CardKind::ProjectileWeapon);
        deck.push(CardKind::PoisonWeapon);
        deck.push(CardKind::ProjectileDefense);
        deck.push(CardKind::PoisonDefense);
    }
    for _ in 0..5 {
        deck.push(CardKind::Worthless);
    }
    deck
}

/// The unshuffled spice deck: one territory card per spice field plus
/// four Shai-Hulud cards.
pub fn spice_deck() -> Vec<SpiceCard> {
    let mut deck: Vec<SpiceCard> = map::LOCATIONS
        .iter()
        .filter_map(|def| {
            def.spice_sector.map(|sector| SpiceCard::Territory {
                location: def.id,
                sector,
                amount: map::spice_blow_amount(def.id),
            })
        })
        .collect();
    for _ in 0..4 {
        deck.push(SpiceCard::ShaiHulud);
    }
    deck
}
