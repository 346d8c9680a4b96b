//! Property tests for the conversation state machine.
//!
//! Arbitrary operation sequences (valid or not) are applied to a fresh
//! conversation. After every step the status/owner invariant must hold, a
//! rejected operation must leave the aggregate untouched, and an accepted
//! one must bump the version.

use proptest::prelude::*;

use support_desk::domain::conversation::{
    Channel, Conversation, ConversationStatus, CustomerIdentity,
};
use support_desk::domain::foundation::{AgentId, ExternalUserId, Timestamp};

#[derive(Debug, Clone)]
enum Op {
    CustomerMessage,
    Reply,
    Escalate,
    Claim(usize),
    Transfer { expected: usize, to: usize },
    Resolve,
    Ticket,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::CustomerMessage),
        Just(Op::Reply),
        Just(Op::Escalate),
        (0..3usize).prop_map(Op::Claim),
        (0..3usize, 0..3usize).prop_map(|(expected, to)| Op::Transfer { expected, to }),
        Just(Op::Resolve),
        Just(Op::Ticket),
    ]
}

fn apply(conversation: &mut Conversation, op: &Op, agents: &[AgentId]) -> bool {
    let at = Timestamp::now();
    match op {
        Op::CustomerMessage => conversation.record_customer_message(at).is_ok(),
        Op::Reply => {
            conversation.record_reply(at);
            true
        }
        Op::Escalate => conversation.escalate(None, at).is_ok(),
        Op::Claim(agent) => conversation.assign(agents[*agent], None, at).is_ok(),
        Op::Transfer { expected, to } => conversation
            .assign(agents[*to], Some(agents[*expected]), at)
            .is_ok(),
        Op::Resolve => conversation.resolve(at).is_ok(),
        Op::Ticket => conversation.convert_to_ticket(at).is_ok(),
    }
}

proptest! {
    #[test]
    fn owner_invariant_holds_after_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
        let agents: Vec<AgentId> = (0..3).map(|_| AgentId::new()).collect();
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("w-1").unwrap());
        let mut conversation = Conversation::start(Channel::Widget, customer, Timestamp::now());

        for op in &ops {
            let before = conversation.clone();
            let accepted = apply(&mut conversation, op, &agents);

            prop_assert!(conversation.owner_invariant_holds(), "after {:?}: {:?}", op, conversation);
            if accepted {
                prop_assert!(conversation.version() > before.version());
            } else {
                prop_assert_eq!(&conversation, &before);
            }
        }
    }

    #[test]
    fn claimed_conversation_has_exactly_the_claiming_owner(agent in 0..3usize) {
        let agents: Vec<AgentId> = (0..3).map(|_| AgentId::new()).collect();
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("w-2").unwrap());
        let mut conversation = Conversation::start(Channel::Widget, customer, Timestamp::now());
        conversation.escalate(None, Timestamp::now()).unwrap();

        conversation.assign(agents[agent], None, Timestamp::now()).unwrap();

        prop_assert_eq!(conversation.status(), ConversationStatus::Assigned);
        prop_assert_eq!(conversation.assigned_agent(), Some(agents[agent]));
        prop_assert!(conversation.escalated_at().is_none());
        for (i, other) in agents.iter().enumerate() {
            if i != agent {
                prop_assert!(conversation.assign(*other, None, Timestamp::now()).is_err());
            }
        }
    }
}
