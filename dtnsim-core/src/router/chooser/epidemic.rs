use super::{Context, MessageChooser, available, is_offerable, wrap_data};
use crate::{error::UsageError, router::Candidate, router::Neighbor};

/// Offers every message and every data item to every neighbour.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epidemic;

impl MessageChooser for Epidemic {
    fn choose_non_direct_messages(
        &self,
        context: &Context<'_>,
        neighbors: &[Neighbor<'_>],
    ) -> Result<Vec<Candidate>, UsageError> {
        let mut chosen = Vec::new();
        for neighbor in available(neighbors) {
            chosen.extend(
                context
                    .messages
                    .iter()
                    .filter(|message| is_offerable(message, neighbor))
                    .map(|message| Candidate::new((*message).clone(), neighbor)),
            );
            chosen.extend(wrap_data(context, neighbor, context.data));
        }
        Ok(chosen)
    }

    fn replicate(&self) -> Box<dyn MessageChooser> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::DataItem,
        rating::Ratings,
        router::chooser::tests::*,
        time::SimTime,
    };

    #[test]
    fn everything_offered() {
        let ratings = Ratings::new(Default::default()).unwrap().attach(OWN);
        let m1 = message("M1", OTHER);
        let m2 = message("M2", PEER);
        let items = [DataItem {
            id: 1,
            size: 5,
            utility: 0.0,
            modified: SimTime::ZERO,
        }];
        let context = Context {
            host: OWN,
            now: SimTime::ZERO,
            ratings: &ratings,
            messages: vec![&m1, &m2],
            data: &items,
        };

        let peer = router(PEER);
        let other = router(OTHER);
        let to_peer = connection(PEER);
        let to_other = connection(OTHER);
        let neighbors = [neighbor(&to_peer, &peer), neighbor(&to_other, &other)];

        let chosen = Epidemic
            .choose_non_direct_messages(&context, &neighbors)
            .unwrap();

        assert_eq!(ids(&chosen), ["D1->h2", "D1->h3", "M1->h2", "M2->h3"]);
    }
}
