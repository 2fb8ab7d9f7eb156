use std::fmt::Display;

use anyhow::{Result, anyhow};

use crate::math::traits::Number;

use super::mixed_profile::MixedProfile;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InformationSet {
    /// The sequence leading to this information set.
    pub parent: usize,
    /// The sequence of the first action; the actions follow consecutively.
    pub first_sequence: usize,
    pub num_actions: usize,
}

/**
 * The sequences of one player in an extensive game with perfect recall. Sequence 0 is the empty
 * sequence; every action at an information set extends the sequence leading to that set.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerSequences {
    infosets: Vec<InformationSet>,
    num_sequences: usize,
}

impl PlayerSequences {
    pub fn new() -> Self {
        Self {
            infosets: vec![],
            num_sequences: 1,
        }
    }

    /// Adds an information set reached by sequence `parent`, and returns its index.
    pub fn add_infoset(&mut self, parent: usize, num_actions: usize) -> Result<usize> {
        if parent >= self.num_sequences {
            return Err(anyhow!(
                "sequence {} does not exist; there are {} sequences",
                parent,
                self.num_sequences
            ));
        }
        if num_actions == 0 {
            return Err(anyhow!("an information set needs at least one action"));
        }
        self.infosets.push(InformationSet {
            parent,
            first_sequence: self.num_sequences,
            num_actions,
        });
        self.num_sequences += num_actions;
        Ok(self.infosets.len() - 1)
    }

    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    pub fn infosets(&self) -> &[InformationSet] {
        &self.infosets
    }

    pub fn action_sequence(&self, infoset: usize, action: usize) -> usize {
        self.infosets[infoset].first_sequence + action
    }

    /**
     * Whether `plan` satisfies the realisation-plan constraints: the empty sequence has weight one,
     * weights are non-negative, and at every information set the action weights add up to the
     * weight of the parent sequence.
     */
    pub fn is_realisation_plan<T: Number>(&self, plan: &[T], eps: f64) -> bool {
        if plan.len() != self.num_sequences || !plan[0].approx_eq(&T::one(), eps) {
            return false;
        }
        if plan.iter().any(|x| x.lt_zero(eps)) {
            return false;
        }
        self.infosets.iter().all(|h| {
            let total = plan[h.first_sequence..h.first_sequence + h.num_actions]
                .iter()
                .fold(T::zero(), |sum, x| sum + x);
            total.approx_eq(&plan[h.parent], eps)
        })
    }
}

impl Default for PlayerSequences {
    fn default() -> Self {
        Self::new()
    }
}

/// The sequence form of an extensive game, one sequence tree per player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceForm {
    players: Vec<PlayerSequences>,
}

impl SequenceForm {
    pub fn new(players: Vec<PlayerSequences>) -> Self {
        Self { players }
    }

    /// A normal-form game seen as a sequence form: one information set per player.
    pub fn from_strategy_counts(num_strategies: &[usize]) -> Result<Self> {
        let players = num_strategies
            .iter()
            .map(|n| {
                let mut player = PlayerSequences::new();
                player.add_infoset(0, *n)?;
                Ok(player)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { players })
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player: usize) -> &PlayerSequences {
        &self.players[player]
    }
}

/**
 * A behaviour strategy for every player: `action_probability(p, h, a)` is the probability player `p`
 * chooses action `a` at information set `h`.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct BehavProfile<T> {
    players: Vec<Vec<Vec<T>>>,
}

impl<T: Number> BehavProfile<T> {
    /**
     * Converts realisation plans into behaviour: an action is played with probability
     * `x(sequence of the action) / x(sequence leading to the information set)`. Information sets
     * the plan never reaches get the uniform distribution.
     */
    pub fn from_realisation_plans(form: &SequenceForm, plans: &[Vec<T>], eps: f64) -> Result<Self> {
        if plans.len() != form.num_players() {
            return Err(anyhow!(
                "got {} realisation plans for {} players",
                plans.len(),
                form.num_players()
            ));
        }

        let mut players = Vec::with_capacity(plans.len());
        for (p, plan) in plans.iter().enumerate() {
            let sequences = form.player(p);
            if !sequences.is_realisation_plan(plan, eps) {
                return Err(anyhow!("the plan of player {} is not a realisation plan", p));
            }
            let behaviour = sequences
                .infosets()
                .iter()
                .map(|h| {
                    let reach = &plan[h.parent];
                    (0..h.num_actions)
                        .map(|a| {
                            if reach.gt_zero(eps) {
                                plan[h.first_sequence + a].clone() / reach
                            } else {
                                T::one() / &T::from_i64(h.num_actions as i64)
                            }
                        })
                        .collect()
                })
                .collect();
            players.push(behaviour);
        }
        Ok(Self { players })
    }

    /// A mixed profile of a normal-form game, as behaviour at the single information set of each player.
    pub fn from_mixed(profile: &MixedProfile<T>) -> Self {
        Self {
            players: (0..profile.num_players())
                .map(|p| vec![profile.player(p).to_vec()])
                .collect(),
        }
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn action_probability(&self, player: usize, infoset: usize, action: usize) -> &T {
        &self.players[player][infoset][action]
    }

    pub fn infoset(&self, player: usize, infoset: usize) -> &[T] {
        &self.players[player][infoset]
    }
}

impl<T: Display> Display for BehavProfile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (p, player) in self.players.iter().enumerate() {
            if p > 0 {
                write!(f, "; ")?;
            }
            write!(f, "player {}:", p)?;
            for (h, actions) in player.iter().enumerate() {
                write!(f, " h{} [", h)?;
                for (a, x) in actions.iter().enumerate() {
                    if a > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")?;
            }
        }
        Ok(())
    }
}
