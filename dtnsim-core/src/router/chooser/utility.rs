use super::{Context, MessageChooser, available, is_offerable, wrap_data};
use crate::{
    defaults::{
        DEFAULT_DATA_UTILITY_THRESHOLD, DEFAULT_PROPHET_PLUS_WEIGHT, DEFAULT_UTILITY_DP_WEIGHT,
        DEFAULT_UTILITY_EV_WEIGHT, DEFAULT_UTILITY_POWER_THRESHOLD, DEFAULT_UTILITY_POWER_WEIGHT,
        DEFAULT_UTILITY_RD_WEIGHT, DEFAULT_UTILITY_THRESHOLD,
    },
    error::{ConfigError, UsageError},
    message::Message,
    router::{Candidate, Neighbor},
};

/// tolerance on the sum of the weights
const WEIGHT_SUM_DELTA: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct UtilityConfig {
    /// share of the "prophet plus" part (delivery predictability and
    /// power) in the score; `dp_weight` and `power_weight` split it
    pub prophet_plus_weight: f64,
    pub dp_weight: f64,
    pub power_weight: f64,
    pub rd_weight: f64,
    pub ev_weight: f64,
    /// a message is offered if its score is strictly above this value
    pub threshold: f64,
    /// a data item is offered if its utility is at least this value
    pub data_utility_threshold: f64,
    /// neighbours below this remaining energy ratio are not offered anything
    pub power_threshold: f64,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            prophet_plus_weight: DEFAULT_PROPHET_PLUS_WEIGHT,
            dp_weight: DEFAULT_UTILITY_DP_WEIGHT,
            power_weight: DEFAULT_UTILITY_POWER_WEIGHT,
            rd_weight: DEFAULT_UTILITY_RD_WEIGHT,
            ev_weight: DEFAULT_UTILITY_EV_WEIGHT,
            threshold: DEFAULT_UTILITY_THRESHOLD,
            data_utility_threshold: DEFAULT_DATA_UTILITY_THRESHOLD,
            power_threshold: DEFAULT_UTILITY_POWER_THRESHOLD,
        }
    }
}

/// Offers a message to a neighbour when
///
/// ```text
/// wDP·DP(neighbour, m) + wP·power(neighbour) + wRD·(1 − RD(m)) + wEV·EVratio(neighbour)
/// ```
///
/// is above the utility threshold.
#[derive(Debug, Clone)]
pub struct Utility {
    dp_weight: f64,
    power_weight: f64,
    rd_weight: f64,
    ev_weight: f64,
    threshold: f64,
    data_utility_threshold: f64,
    power_threshold: f64,
}

impl Utility {
    pub fn new(config: &UtilityConfig) -> Result<Self, ConfigError> {
        let prophet_plus =
            ConfigError::check_unit("UtilityMessageChooser.prophetPlusWeight", config.prophet_plus_weight)?;
        let dp = ConfigError::check_unit("UtilityMessageChooser.dpWeight", config.dp_weight)?;
        let power = ConfigError::check_unit("UtilityMessageChooser.powerWeight", config.power_weight)?;
        let rd = ConfigError::check_unit("UtilityMessageChooser.rdWeight", config.rd_weight)?;
        let ev = ConfigError::check_unit("UtilityMessageChooser.evWeight", config.ev_weight)?;

        let (dp, power) = (prophet_plus * dp, prophet_plus * power);
        let sum = dp + power + rd + ev;
        if (1.0 - sum).abs() >= WEIGHT_SUM_DELTA {
            return Err(ConfigError::WeightSum { sum });
        }

        Ok(Self {
            dp_weight: dp,
            power_weight: power,
            rd_weight: rd,
            ev_weight: ev,
            threshold: ConfigError::check_unit("UtilityMessageChooser.utilityThreshold", config.threshold)?,
            data_utility_threshold: ConfigError::check_unit(
                "UtilityMessageChooser.dataUtilityThreshold",
                config.data_utility_threshold,
            )?,
            power_threshold: ConfigError::check_unit(
                "UtilityMessageChooser.powerThreshold",
                config.power_threshold,
            )?,
        })
    }

    /// effective weight of the neighbour's delivery predictability
    #[inline]
    pub fn dp_weight(&self) -> f64 {
        self.dp_weight
    }

    /// effective weight of the neighbour's remaining energy
    #[inline]
    pub fn power_weight(&self) -> f64 {
        self.power_weight
    }

    #[inline]
    pub fn rd_weight(&self) -> f64 {
        self.rd_weight
    }

    #[inline]
    pub fn ev_weight(&self) -> f64 {
        self.ev_weight
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn score(
        &self,
        context: &Context<'_>,
        message: &Message,
        neighbor: &Neighbor<'_>,
    ) -> Result<f64, UsageError> {
        let other = neighbor.ratings();
        Ok(self.dp_weight * other.predictability(message)?
            + self.power_weight * neighbor.energy_ratio()
            + self.rd_weight * (1.0 - context.ratings.density(message)?)
            + self.ev_weight * context.ratings.encounter_ratio(other))
    }
}

impl MessageChooser for Utility {
    fn choose_non_direct_messages(
        &self,
        context: &Context<'_>,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut chosen = Vec::new();
        for neighbor in available(neighbors) {
            if neighbor.energy_ratio() < self.power_threshold {
                continue;
            }
            for message in &context.messages {
                if is_offerable(message, neighbor) && self.score(context, message, neighbor)? > self.threshold {
                    chosen.push(Candidate::new((*message).clone(), neighbor));
                }
            }
            let useful = context
                .data
                .iter()
                .filter(|item| item.utility >= self.data_utility_threshold);
            chosen.extend(wrap_data(context, neighbor, useful));
        }
        Ok(chosen)
    }

    fn replicate(&self) -> Box<dyn MessageChooser> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::HostId,
        message::DataItem,
        rating::Ratings,
        router::chooser::tests::*,
        time::SimTime,
    };

    fn item(id: u64, utility: f64) -> DataItem {
        DataItem {
            id,
            size: 5,
            utility,
            modified: SimTime::ZERO,
        }
    }

    // ------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------

    #[test]
    fn default_weights_sum_to_one() {
        let utility = Utility::new(&UtilityConfig::default()).unwrap();
        let sum = utility.dp_weight() + utility.power_weight() + utility.rd_weight() + utility.ev_weight();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_DELTA);
    }

    #[test]
    fn weights_not_summing_to_one() {
        let Err(error) = Utility::new(&UtilityConfig {
            ev_weight: 0.3,
            ..UtilityConfig::default()
        }) else {
            panic!("weights summing up to 1.2 should be refused")
        };
        assert!(
            matches!(error, ConfigError::WeightSum { sum } if (sum - 1.2).abs() < 1e-9),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn negative_weight() {
        let Err(error) = Utility::new(&UtilityConfig {
            rd_weight: -0.1,
            ..UtilityConfig::default()
        }) else {
            panic!("negative weights should be refused")
        };
        assert!(matches!(error, ConfigError::OutOfRange { .. }));
    }

    // ------------------------------------------------------------------
    // choosing
    // ------------------------------------------------------------------

    fn chooser(threshold: f64) -> Utility {
        Utility::new(&UtilityConfig {
            threshold,
            data_utility_threshold: 0.5,
            power_threshold: 0.2,
            ..UtilityConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn score_combines_all_ratings() {
        let mut own = Ratings::new(Default::default()).unwrap().attach(OWN);
        let m1 = message("M1", OTHER);
        own.track(&m1);

        let mut peer = router(PEER);
        let mut other = router(OTHER);
        Ratings::meet(peer.ratings_mut(), other.ratings_mut(), SimTime::ZERO);
        let link = connection(PEER);

        let context = Context {
            host: OWN,
            now: SimTime::ZERO,
            ratings: &own,
            messages: vec![&m1],
            data: &[],
        };
        let utility = chooser(0.2);
        let score = utility.score(&context, &m1, &neighbor(&link, &peer)).unwrap();

        let expected = utility.dp_weight() * 0.75
            + utility.power_weight() * 1.0
            + utility.rd_weight() * 0.5
            + utility.ev_weight() * 0.5;
        assert!((score - expected).abs() < 1e-12, "{score} != {expected}");
    }

    #[test]
    fn only_useful_messages_and_data() {
        let mut own = Ratings::new(Default::default()).unwrap().attach(OWN);
        let likely = message("M1", OTHER);
        let unlikely = message("M2", HostId::new(9));
        own.track(&likely);
        own.track(&unlikely);

        let mut peer = router(PEER);
        let mut other = router(OTHER);
        Ratings::meet(peer.ratings_mut(), other.ratings_mut(), SimTime::ZERO);
        let link = connection(PEER);

        let items = [item(1, 0.9), item(2, 0.1)];
        let context = Context {
            host: OWN,
            now: SimTime::ZERO,
            ratings: &own,
            messages: vec![&likely, &unlikely],
            data: &items,
        };

        // M2 scores power + rd + ev only: 0.0325 + 0.125 + 0.05
        let chosen = chooser(0.3)
            .choose_non_direct_messages(&context, &[neighbor(&link, &peer)])
            .unwrap();
        assert_eq!(ids(&chosen), ["D1->h2", "M1->h2"]);
    }

    #[test]
    fn weak_neighbors_get_nothing() {
        let own = Ratings::new(Default::default()).unwrap().attach(OWN);
        let items = [item(1, 0.9)];
        let context = Context {
            host: OWN,
            now: SimTime::ZERO,
            ratings: &own,
            messages: Vec::new(),
            data: &items,
        };
        let weak = router_with_energy(PEER, 0.1);
        let strong = router_with_energy(OTHER, 0.5);
        let to_weak = connection(PEER);
        let to_strong = connection(OTHER);

        let chosen = chooser(0.2)
            .choose_non_direct_messages(
                &context,
                &[neighbor(&to_weak, &weak), neighbor(&to_strong, &strong)],
            )
            .unwrap();
        assert_eq!(ids(&chosen), ["D1->h3"]);
    }

    #[test]
    fn replica_keeps_settings() {
        let utility = chooser(0.4);
        let replica = utility.replicate();
        assert_eq!(format!("{utility:?}"), format!("{replica:?}"));
    }
}
