use std::collections::HashSet;

use crate::runtime::{
    error::{EvalError, EvalResult},
    gc::{NodeId, SlotState},
    value::Node,
};

use super::{
    Evaluator,
    frame::{Control, Frame, Whnf},
};

impl Evaluator<'_> {
    /// Examines the node at `id` and decides how to bring it to WHNF.
    ///
    /// Indirections are followed, and once the end of the chain is known
    /// every link is pointed straight at it. A thunk is claimed and its
    /// expression evaluated under an update marker. A thunk this actor has
    /// already claimed is a black hole.
    pub(super) fn demand(&mut self, id: NodeId) -> EvalResult<Control> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id;

        loop {
            match self.heap.node(current)? {
                Node::Indirection(target) => {
                    if !seen.insert(current) {
                        return Err(EvalError::NonTermination { node: current });
                    }
                    chain.push(current);
                    current = target;
                }
                Node::Thunk(thunk) => match self.heap.try_claim(current, self.actor)? {
                    Ok(()) => {
                        if !chain.is_empty() {
                            self.push(Frame::Redirect { chain })?;
                        }
                        self.push(Frame::Update { node: current })?;
                        return Ok(Control::Eval(thunk.expr, thunk.env));
                    }
                    Err(SlotState::InProgress(owner)) if owner == self.actor => {
                        return Err(EvalError::NonTermination { node: current });
                    }
                    Err(SlotState::InProgress(_)) => self.wait_on(current)?,
                    // Completed or released since it was read; look again.
                    Err(SlotState::Evaluated | SlotState::Unevaluated) => {}
                },
                whnf => {
                    self.collapse(&chain, current)?;
                    return Ok(Control::Return(Whnf::stored(current, whnf)));
                }
            }
        }
    }

    pub(super) fn collapse(&self, chain: &[NodeId], target: NodeId) -> EvalResult<()> {
        for link in chain {
            self.heap.redirect(*link, target)?;
        }
        Ok(())
    }

    /// Blocks until another actor finishes or abandons `node`.
    fn wait_on(&mut self, node: NodeId) -> EvalResult<()> {
        self.heap.begin_wait(self.actor, node)?;
        log::trace!("{} waiting on {}", self.actor, node);
        let result = self.block_while_claimed(node);
        self.heap.end_wait(self.actor);
        result
    }

    fn block_while_claimed(&self, node: NodeId) -> EvalResult<()> {
        loop {
            self.check_interrupt()?;
            let seen = self.heap.epoch();
            match self.heap.state(node)? {
                SlotState::InProgress(owner) if owner != self.actor => {
                    self.heap.wait_for_change(seen, self.config.wait_poll());
                }
                _ => return Ok(()),
            }
        }
    }
}
