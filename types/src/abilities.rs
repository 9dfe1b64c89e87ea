//! Builtin interrupt ability table.
//!
//! Maps game spell ids to the interrupt each class brings. The table is the
//! default valid-id set for wire validation and supplies base cooldowns for
//! locally observed casts; user override files can extend or replace entries
//! at runtime (see the core catalog).

/// Static data for one interrupt ability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityInfo {
    pub name: &'static str,
    pub class: &'static str,
    pub base_cooldown_secs: f32,
}

/// Builtin interrupt roster, keyed by spell id.
pub static INTERRUPT_ABILITIES: phf::Map<u32, AbilityInfo> = phf::phf_map! {
    1766u32 => AbilityInfo { name: "Kick", class: "Rogue", base_cooldown_secs: 15.0 },
    2139u32 => AbilityInfo { name: "Counterspell", class: "Mage", base_cooldown_secs: 24.0 },
    6552u32 => AbilityInfo { name: "Pummel", class: "Warrior", base_cooldown_secs: 15.0 },
    15487u32 => AbilityInfo { name: "Silence", class: "Priest", base_cooldown_secs: 45.0 },
    19647u32 => AbilityInfo { name: "Spell Lock", class: "Warlock", base_cooldown_secs: 24.0 },
    47528u32 => AbilityInfo { name: "Mind Freeze", class: "Death Knight", base_cooldown_secs: 15.0 },
    57994u32 => AbilityInfo { name: "Wind Shear", class: "Shaman", base_cooldown_secs: 12.0 },
    96231u32 => AbilityInfo { name: "Rebuke", class: "Paladin", base_cooldown_secs: 15.0 },
    106839u32 => AbilityInfo { name: "Skull Bash", class: "Druid", base_cooldown_secs: 15.0 },
    116705u32 => AbilityInfo { name: "Spear Hand Strike", class: "Monk", base_cooldown_secs: 15.0 },
    147362u32 => AbilityInfo { name: "Counter Shot", class: "Hunter", base_cooldown_secs: 24.0 },
    183752u32 => AbilityInfo { name: "Disrupt", class: "Demon Hunter", base_cooldown_secs: 15.0 },
    187707u32 => AbilityInfo { name: "Muzzle", class: "Hunter", base_cooldown_secs: 15.0 },
    351338u32 => AbilityInfo { name: "Quell", class: "Evoker", base_cooldown_secs: 40.0 },
};

/// Whether `id` is in the builtin interrupt table.
pub fn is_known_interrupt(id: u32) -> bool {
    INTERRUPT_ABILITIES.contains_key(&id)
}

/// Base cooldown for a builtin interrupt, if known.
pub fn base_cooldown_secs(id: u32) -> Option<f32> {
    INTERRUPT_ABILITIES.get(&id).map(|info| info.base_cooldown_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let cs = INTERRUPT_ABILITIES.get(&2139).unwrap();
        assert_eq!(cs.name, "Counterspell");
        assert_eq!(cs.class, "Mage");
        assert_eq!(cs.base_cooldown_secs, 24.0);
    }

    #[test]
    fn test_unknown_id() {
        assert!(!is_known_interrupt(9999));
        assert_eq!(base_cooldown_secs(9999), None);
    }
}
