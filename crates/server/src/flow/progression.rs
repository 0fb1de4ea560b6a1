use super::{Status, Step, Task, User};

/// The step and task the user's cursors currently point at. Valid for the
/// whole lifetime of a user: cursors freeze in place once the flow reaches
/// a terminal status, still addressing the last step and task touched.
pub fn current_position(user: &User) -> (&Step, &Task) {
    let step = &user.steps[user.current_step_index];
    (step, &step.tasks[step.current_task_index])
}

/// Advance the flow after the current task's status has been resolved.
///
/// A rejected task pulls its step and the whole user down to `Rejected` and
/// halts the flow permanently (returns false). Otherwise the task cursor
/// moves forward within the step; finishing the last task completes the
/// step and moves the step cursor, and finishing the last task of the last
/// step accepts the user. This is the only place `Accepted` and `Rejected`
/// are assigned. Callers must not invoke this on a user already in a
/// terminal status.
pub fn progress(user: &mut User) -> bool {
    let step = &mut user.steps[user.current_step_index];

    if step.current_task().status == Status::Rejected {
        step.status = Status::Rejected;
        user.status = Status::Rejected;
        return false;
    }

    if step.current_task_index < step.tasks.len() - 1 {
        step.current_task_index += 1;
    } else {
        step.status = Status::Completed;
        if user.current_step_index < user.steps.len() - 1 {
            user.current_step_index += 1;
        } else {
            user.status = Status::Accepted;
        }
    }
    true
}
