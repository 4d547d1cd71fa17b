//! Gambling: stake points on randomly drawn target fields.
//!
//! One round = one bet-and-reveal cycle. The stake leaves the balance the
//! moment the round starts; the first press resolves it, hit or miss.

use rand::prelude::*;

use crate::hw::LED_COUNT;

use super::GameError;

pub const STARTING_POINTS: i32 = 100;
pub const MIN_BET: i32 = 10;
pub const BET_STEP: i32 = 10;

/// Payout multiplier. Higher multipliers light fewer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Multiplier {
    #[default]
    X2,
    X3,
    X5,
}

impl Multiplier {
    pub fn value(self) -> i32 {
        match self {
            Multiplier::X2 => 2,
            Multiplier::X3 => 3,
            Multiplier::X5 => 5,
        }
    }

    pub fn target_count(self) -> usize {
        match self {
            Multiplier::X2 => 4,
            Multiplier::X3 => 2,
            Multiplier::X5 => 1,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Multiplier::X2 => Multiplier::X3,
            Multiplier::X3 => Multiplier::X5,
            Multiplier::X5 => Multiplier::X2,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Multiplier::X2 => Multiplier::X5,
            Multiplier::X3 => Multiplier::X2,
            Multiplier::X5 => Multiplier::X3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamblePhase {
    /// Between rounds: the bet and multiplier are adjustable.
    #[default]
    Betting,
    /// Stake deducted, targets lit, waiting for the first press.
    RoundActive,
    /// Points exhausted. Terminal until an explicit restart.
    GameOver,
}

/// How a round resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub hit: bool,
    /// Points paid back into the balance (0 on a miss).
    pub payout: i32,
    /// The balance hit zero and the game is over.
    pub busted: bool,
}

#[derive(Debug, Clone)]
pub struct GamblingGame {
    pub points: i32,
    pub bet: i32,
    pub multiplier: Multiplier,
    targets: Vec<u8>,
    phase: GamblePhase,
}

impl Default for GamblingGame {
    fn default() -> Self {
        Self {
            points: STARTING_POINTS,
            bet: MIN_BET,
            multiplier: Multiplier::default(),
            targets: Vec::new(),
            phase: GamblePhase::Betting,
        }
    }
}

impl GamblingGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamblePhase {
        self.phase
    }

    pub fn targets(&self) -> &[u8] {
        &self.targets
    }

    /// Desired field state: targets lit while a round is active.
    pub fn leds(&self) -> [bool; LED_COUNT] {
        let mut leds = [false; LED_COUNT];
        if self.phase == GamblePhase::RoundActive {
            for &target in &self.targets {
                leds[target as usize] = true;
            }
        }
        leds
    }

    /// Stakes the current bet and draws the round's targets. The stake is
    /// deducted up front; a miss costs nothing further. Returns whether a
    /// round actually started.
    pub fn start_round<R: Rng>(&mut self, rng: &mut R) -> Result<bool, GameError> {
        if self.phase != GamblePhase::Betting {
            return Ok(false);
        }
        if self.points < self.bet {
            return Err(GameError::InsufficientPoints {
                points: self.points,
                bet: self.bet,
            });
        }

        self.points -= self.bet;
        self.targets = (0..LED_COUNT as u8).choose_multiple(rng, self.multiplier.target_count());
        self.phase = GamblePhase::RoundActive;
        Ok(true)
    }

    /// Resolves the round on the first press, hit or miss. Returns None when
    /// no round is active.
    pub fn resolve_press(&mut self, channel: u8) -> Option<RoundOutcome> {
        if self.phase != GamblePhase::RoundActive {
            return None;
        }

        let hit = self.targets.contains(&channel);
        let payout = if hit {
            self.bet * self.multiplier.value()
        } else {
            0
        };
        self.points += payout;
        self.targets.clear();

        let busted = self.points <= 0;
        self.phase = if busted {
            GamblePhase::GameOver
        } else {
            GamblePhase::Betting
        };
        Some(RoundOutcome {
            hit,
            payout,
            busted,
        })
    }

    /// Bet adjustments only apply between rounds; the amount stays within
    /// [MIN_BET, points].
    pub fn raise_bet(&mut self) {
        if self.phase == GamblePhase::Betting {
            self.bet = (self.bet + BET_STEP).min(self.points).max(MIN_BET);
        }
    }

    pub fn lower_bet(&mut self) {
        if self.phase == GamblePhase::Betting {
            self.bet = (self.bet - BET_STEP).max(MIN_BET);
        }
    }

    pub fn cycle_multiplier_next(&mut self) {
        if self.phase == GamblePhase::Betting {
            self.multiplier = self.multiplier.next();
        }
    }

    pub fn cycle_multiplier_prev(&mut self) {
        if self.phase == GamblePhase::Betting {
            self.multiplier = self.multiplier.prev();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn miss_channel(game: &GamblingGame) -> u8 {
        (0..LED_COUNT as u8)
            .find(|channel| !game.targets().contains(channel))
            .expect("fewer than 8 targets leaves at least one miss channel")
    }

    #[test]
    fn target_count_follows_the_multiplier() {
        let mut rng = rng();
        for (multiplier, count) in [
            (Multiplier::X2, 4),
            (Multiplier::X3, 2),
            (Multiplier::X5, 1),
        ] {
            let mut game = GamblingGame::new();
            game.multiplier = multiplier;
            assert!(game.start_round(&mut rng).unwrap());
            assert_eq!(game.targets().len(), count);
            let leds = game.leds();
            assert_eq!(leds.iter().filter(|&&on| on).count(), count);
        }
    }

    #[test]
    fn round_arithmetic_hit_and_miss() {
        let mut rng = rng();

        let mut game = GamblingGame::new();
        game.bet = 20;
        game.multiplier = Multiplier::X3;
        game.start_round(&mut rng).unwrap();
        assert_eq!(game.points, 80, "stake leaves the balance up front");

        let target = game.targets()[0];
        let outcome = game.resolve_press(target).unwrap();
        assert!(outcome.hit);
        assert_eq!(outcome.payout, 60);
        // points_after = points_before - bet + bet * multiplier
        assert_eq!(game.points, 140);
        assert_eq!(game.phase(), GamblePhase::Betting);

        game.start_round(&mut rng).unwrap();
        assert_eq!(game.points, 120);
        let miss = miss_channel(&game);
        let outcome = game.resolve_press(miss).unwrap();
        assert!(!outcome.hit);
        assert_eq!(outcome.payout, 0);
        assert_eq!(game.points, 120, "a miss costs nothing beyond the stake");
    }

    #[test]
    fn round_always_ends_on_the_first_press() {
        let mut rng = rng();
        let mut game = GamblingGame::new();
        game.start_round(&mut rng).unwrap();

        let miss = miss_channel(&game);
        game.resolve_press(miss).unwrap();
        assert_eq!(game.phase(), GamblePhase::Betting);
        assert!(game.targets().is_empty());
        assert!(game.leds().iter().all(|&on| !on));

        // No round active: a press resolves nothing.
        assert_eq!(game.resolve_press(0), None);
    }

    #[test]
    fn miss_scenario_points_100_bet_10_x5() {
        let mut rng = rng();
        let mut game = GamblingGame::new();
        game.multiplier = Multiplier::X5;
        game.start_round(&mut rng).unwrap();
        assert_eq!(game.targets().len(), 1);

        let miss = miss_channel(&game);
        let outcome = game.resolve_press(miss).unwrap();
        assert!(!outcome.busted);
        assert_eq!(game.points, 90);
        assert_eq!(game.phase(), GamblePhase::Betting);
    }

    #[test]
    fn bust_sets_game_over_exactly_once() {
        let mut rng = rng();
        let mut game = GamblingGame::new();
        game.points = 10;
        game.bet = 10;
        game.start_round(&mut rng).unwrap();
        assert_eq!(game.points, 0);

        let miss = miss_channel(&game);
        let outcome = game.resolve_press(miss).unwrap();
        assert!(outcome.busted);
        assert_eq!(game.phase(), GamblePhase::GameOver);

        // Terminal: no further rounds, no further resolutions.
        assert!(!game.start_round(&mut rng).unwrap());
        assert_eq!(game.resolve_press(0), None);
        assert_eq!(game.phase(), GamblePhase::GameOver);
    }

    #[test]
    fn insufficient_points_is_a_rejected_noop() {
        let mut rng = rng();
        let mut game = GamblingGame::new();
        game.points = 10;
        game.bet = 10;
        game.start_round(&mut rng).unwrap();
        let miss = miss_channel(&game);
        game.resolve_press(miss).unwrap();

        // Game over with zero points: restarting a round must not mutate.
        let before = game.points;
        assert!(!game.start_round(&mut rng).unwrap());
        assert_eq!(game.points, before);

        // And a betting-phase game with a too-large bet is rejected loudly.
        let mut game = GamblingGame::new();
        game.points = 5;
        game.bet = 10;
        let err = game.start_round(&mut rng).unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientPoints {
                points: 5,
                bet: 10
            }
        );
        assert_eq!(game.points, 5, "rejected action leaves state unchanged");
        assert_eq!(game.phase(), GamblePhase::Betting);
    }

    #[test]
    fn bet_is_clamped_to_min_and_balance() {
        let mut game = GamblingGame::new();
        game.lower_bet();
        assert_eq!(game.bet, MIN_BET, "bet never falls below the minimum");

        for _ in 0..20 {
            game.raise_bet();
        }
        assert_eq!(game.bet, game.points, "bet never exceeds the balance");
    }

    #[test]
    fn bet_adjustments_ignored_mid_round() {
        let mut rng = rng();
        let mut game = GamblingGame::new();
        game.start_round(&mut rng).unwrap();
        let bet = game.bet;
        let multiplier = game.multiplier;
        game.raise_bet();
        game.cycle_multiplier_next();
        assert_eq!(game.bet, bet);
        assert_eq!(game.multiplier, multiplier);
    }

    #[test]
    fn multiplier_cycles_both_directions() {
        let mut game = GamblingGame::new();
        game.cycle_multiplier_next();
        assert_eq!(game.multiplier, Multiplier::X3);
        game.cycle_multiplier_next();
        assert_eq!(game.multiplier, Multiplier::X5);
        game.cycle_multiplier_next();
        assert_eq!(game.multiplier, Multiplier::X2);

        game.cycle_multiplier_prev();
        assert_eq!(game.multiplier, Multiplier::X5);
        game.cycle_multiplier_prev();
        assert_eq!(game.multiplier, Multiplier::X3);
        game.cycle_multiplier_prev();
        assert_eq!(game.multiplier, Multiplier::X2);
    }
}
