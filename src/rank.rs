use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTier {
    pub tier: &'static str,
    pub thai_name: &'static str,
    pub min_score: f64,
    pub description: &'static str,
    pub skin_prefix: &'static str,
    pub hex_color: &'static str,
}

pub const RANKS: [RankTier; 8] = [
    RankTier {
        tier: "Novice Scout",
        thai_name: "นักสำรวจฝึกหัด",
        min_score: 0.0,
        description: "First step into the wild.",
        skin_prefix: "Noob",
        hex_color: "a8a29e",
    },
    RankTier {
        tier: "Pathfinder",
        thai_name: "ผู้บุกเบิก",
        min_score: 40.0,
        description: "Finding the way through the thicket.",
        skin_prefix: "Explorer",
        hex_color: "34d399",
    },
    RankTier {
        tier: "Hunter",
        thai_name: "นายพราน",
        min_score: 50.0,
        description: "Survival of the fittest.",
        skin_prefix: "Pro",
        hex_color: "d97706",
    },
    RankTier {
        tier: "Ranger",
        thai_name: "ผู้พิทักษ์ป่า",
        min_score: 60.0,
        description: "One with the forest.",
        skin_prefix: "Veteran",
        hex_color: "2dd4bf",
    },
    RankTier {
        tier: "Druid",
        thai_name: "นักปราชญ์ไพร",
        min_score: 70.0,
        description: "Ancient wisdom unleashed.",
        skin_prefix: "Master",
        hex_color: "e879f9",
    },
    RankTier {
        tier: "Chieftain",
        thai_name: "หัวหน้าเผ่า",
        min_score: 80.0,
        description: "Leader of the pack.",
        skin_prefix: "Epic",
        hex_color: "facc15",
    },
    RankTier {
        tier: "Jungle King",
        thai_name: "เจ้าป่า",
        min_score: 85.0,
        description: "Ruler of the wild.",
        skin_prefix: "Legendary",
        hex_color: "f97316",
    },
    RankTier {
        tier: "Ancient Guardian",
        thai_name: "เทพพิทักษ์",
        min_score: 90.0,
        description: "The Eternal Legend of Nature.",
        skin_prefix: "Godlike",
        hex_color: "67e8f9",
    },
];

impl RankTier {
    pub fn avatar_url(&self) -> String {
        let seed: String = self.tier.split_whitespace().collect();
        format!(
            "https://api.dicebear.com/9.x/bottts/svg?seed={seed}&baseColor={}",
            self.hex_color
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeroClass {
    Warrior,
    Mage,
    Assassin,
    Carry,
    Tank,
    Support,
}

impl HeroClass {
    pub const ALL: [HeroClass; 6] = [
        HeroClass::Warrior,
        HeroClass::Mage,
        HeroClass::Assassin,
        HeroClass::Carry,
        HeroClass::Tank,
        HeroClass::Support,
    ];

    pub fn from_identifier(identifier: &str) -> Self {
        let modulus = Self::ALL.len() as u64;
        let index = identifier
            .chars()
            .filter_map(|c| c.to_digit(10))
            .fold(0u64, |acc, digit| (acc * 10 + digit as u64) % modulus);
        Self::ALL[index as usize]
    }

    pub fn title(self) -> &'static str {
        match self {
            HeroClass::Warrior => "Fighter",
            HeroClass::Mage => "Wizard",
            HeroClass::Assassin => "Ninja",
            HeroClass::Carry => "Gunner",
            HeroClass::Tank => "Defender",
            HeroClass::Support => "Medic",
        }
    }
}

impl fmt::Display for HeroClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeroClass::Warrior => "Warrior",
            HeroClass::Mage => "Mage",
            HeroClass::Assassin => "Assassin",
            HeroClass::Carry => "Carry",
            HeroClass::Tank => "Tank",
            HeroClass::Support => "Support",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("ด.ญ.")
            || name.starts_with("น.ส.")
            || name.starts_with("นาง")
            || name.contains("หญิง")
        {
            Gender::Female
        } else {
            Gender::Male
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankResolution {
    pub current: &'static RankTier,
    pub next: Option<&'static RankTier>,
    /// Percent of the way to `next`; not clamped, see `display_progress`.
    pub progress: f64,
    pub rank_index: usize,
    pub hero_class: HeroClass,
}

impl RankResolution {
    pub fn display_progress(&self) -> f64 {
        self.progress.min(100.0)
    }

    pub fn skin_name(&self) -> String {
        format!("[{}] {}", self.current.skin_prefix, self.hero_class.title())
    }

    pub fn avatar_url(&self) -> String {
        self.current.avatar_url()
    }
}

pub fn resolve_rank(total_score: f64, identity_seed: &str) -> RankResolution {
    let mut rank_index = 0;
    for (index, tier) in RANKS.iter().enumerate() {
        if total_score >= tier.min_score {
            rank_index = index;
        } else {
            break;
        }
    }

    let current = &RANKS[rank_index];
    let next = RANKS.get(rank_index + 1);
    let progress = match next {
        Some(next) => {
            (total_score - current.min_score) / (next.min_score - current.min_score) * 100.0
        }
        None => 100.0,
    };

    RankResolution {
        current,
        next,
        progress,
        rank_index,
        hero_class: HeroClass::from_identifier(identity_seed),
    }
}
