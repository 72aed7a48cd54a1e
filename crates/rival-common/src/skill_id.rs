// skill_id.rs -- skill identifier packing and group keys
//
// Player skill ids pack three fields into a decimal layout:
// skill * 10000 + level * 100 + sub. The client sometimes sets a use-flag
// bit on top of the raw id; boss skills use a separate low-16-bit layout.

/// Flag bit the client ORs onto a skill id when issuing a start request.
pub const SKILL_USE_FLAG: u32 = 0x0400_0000;

/// A decomposed skill identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillId {
    /// The id exactly as it appeared on the wire.
    pub raw: u32,
    /// The id with the use flag stripped.
    pub id: u32,
    pub skill: u32,
    pub level: u32,
    pub sub: u32,
}

impl SkillId {
    /// Decompose a player skill id. `masked` indicates the wire value may
    /// carry [`SKILL_USE_FLAG`].
    pub fn parse(raw: u32, masked: bool) -> Self {
        let id = if masked { raw & !SKILL_USE_FLAG } else { raw };
        Self {
            raw,
            id,
            skill: id / 10000,
            level: (id / 100) % 100,
            sub: id % 100,
        }
    }

    /// Decompose a boss (NPC) skill id: only the low 16 bits are meaningful
    /// and the level field is not encoded.
    pub fn parse_boss(raw: u32) -> Self {
        let id = raw & 0xFFFF;
        Self {
            raw,
            id,
            skill: id / 100,
            level: 1,
            sub: id % 100,
        }
    }

    /// Recompose a player skill id from its fields.
    pub fn base_id(skill: u32, level: u32, sub: u32) -> u32 {
        skill * 10000 + level * 100 + sub
    }

    /// The id of this skill at the same level with sub 0.
    pub fn normalized(&self) -> u32 {
        Self::base_id(self.skill, self.level, 0)
    }

    /// Cooldown group key shared by every member of a skill family.
    pub fn group_key(&self) -> String {
        format!("{}-0", self.skill)
    }
}

/// Group key for a raw skill id without building a full [`SkillId`].
pub fn group_key_of(raw: u32) -> String {
    SkillId::parse(raw, true).group_key()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let s = SkillId::parse(200201, false);
        assert_eq!(s.skill, 20);
        assert_eq!(s.level, 2);
        assert_eq!(s.sub, 1);
    }

    #[test]
    fn test_parse_strips_use_flag() {
        let s = SkillId::parse(200201 | SKILL_USE_FLAG, true);
        assert_eq!(s.id, 200201);
        assert_eq!(s.raw, 200201 | SKILL_USE_FLAG);
    }

    #[test]
    fn test_base_id_round_trip() {
        let s = SkillId::parse(359076 | SKILL_USE_FLAG, true);
        assert_eq!(SkillId::base_id(s.skill, s.level, s.sub), 359076);
    }

    #[test]
    fn test_normalized_zeroes_sub() {
        let s = SkillId::parse(200213, false);
        assert_eq!(s.normalized(), 200200);
    }

    #[test]
    fn test_group_key() {
        assert_eq!(group_key_of(200100), "20-0");
        assert_eq!(group_key_of(359076), "35-0");
    }

    #[test]
    fn test_boss_parse() {
        let s = SkillId::parse_boss(0x0003_1234);
        assert_eq!(s.id, 0x1234);
        assert_eq!(s.skill, 0x1234 / 100);
        assert_eq!(s.level, 1);
    }
}
