use std::ops::{Add, AddAssign, Index, IndexMut, Sub};

use serde::{Deserialize, Serialize};

/// City output categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Food,
    Shield,
    Trade,
    Gold,
    Luxury,
    Science,
}

impl OutputType {
    pub const ALL: [OutputType; 6] = [
        OutputType::Food,
        OutputType::Shield,
        OutputType::Trade,
        OutputType::Gold,
        OutputType::Luxury,
        OutputType::Science,
    ];
}

/// One integer per output type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    pub food: i32,
    pub shield: i32,
    pub trade: i32,
    pub gold: i32,
    pub luxury: i32,
    pub science: i32,
}

impl Outputs {
    pub const ZERO: Outputs = Outputs {
        food: 0,
        shield: 0,
        trade: 0,
        gold: 0,
        luxury: 0,
        science: 0,
    };

    pub fn splat(v: i32) -> Self {
        Self {
            food: v,
            shield: v,
            trade: v,
            gold: v,
            luxury: v,
            science: v,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutputType, i32)> + '_ {
        OutputType::ALL.into_iter().map(move |o| (o, self[o]))
    }

    /// Per-output map.
    pub fn map(self, mut f: impl FnMut(OutputType, i32) -> i32) -> Self {
        let mut out = Outputs::ZERO;
        for o in OutputType::ALL {
            out[o] = f(o, self[o]);
        }
        out
    }
}

impl Index<OutputType> for Outputs {
    type Output = i32;

    fn index(&self, o: OutputType) -> &i32 {
        match o {
            OutputType::Food => &self.food,
            OutputType::Shield => &self.shield,
            OutputType::Trade => &self.trade,
            OutputType::Gold => &self.gold,
            OutputType::Luxury => &self.luxury,
            OutputType::Science => &self.science,
        }
    }
}

impl IndexMut<OutputType> for Outputs {
    fn index_mut(&mut self, o: OutputType) -> &mut i32 {
        match o {
            OutputType::Food => &mut self.food,
            OutputType::Shield => &mut self.shield,
            OutputType::Trade => &mut self.trade,
            OutputType::Gold => &mut self.gold,
            OutputType::Luxury => &mut self.luxury,
            OutputType::Science => &mut self.science,
        }
    }
}

impl Add for Outputs {
    type Output = Outputs;

    fn add(self, rhs: Outputs) -> Outputs {
        self.map(|o, v| v + rhs[o])
    }
}

impl Sub for Outputs {
    type Output = Outputs;

    fn sub(self, rhs: Outputs) -> Outputs {
        self.map(|o, v| v - rhs[o])
    }
}

impl AddAssign for Outputs {
    fn add_assign(&mut self, rhs: Outputs) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_arithmetic_agree() {
        let mut a = Outputs::ZERO;
        a[OutputType::Shield] = 4;
        a.food = 2;
        let b = Outputs::splat(1);
        let c = a + b - Outputs::splat(2);
        assert_eq!(c.shield, 3);
        assert_eq!(c.food, 1);
        assert_eq!(c[OutputType::Science], -1);
    }
}
