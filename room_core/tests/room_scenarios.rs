use std::time::{Duration, Instant};

use room_core::{
    geometry::MOVE_DELAY,
    protocol::{ActionRequest, InitValue},
    Action, ActionType, Direction, RoomError, RoomMap, RoomState,
};
use serde_json::json;
use uuid::Uuid;

#[test]
fn walk_then_rate_limit_then_rotate() {
    let mut state = RoomState::new(Uuid::new_v4(), RoomMap::open(10, 10));
    let a = Uuid::new_v4();
    let t0 = Instant::now();

    state.apply_at(Action::Join { user_id: a }, t0).unwrap();
    assert_eq!(state.participant(&a).unwrap().position.cell(), (0, 0));
    assert_eq!(state.participant(&a).unwrap().direction, Direction::Right);
    let joined = state.version();

    let t1 = t0 + MOVE_DELAY;
    let v = state
        .apply_at(Action::Move { user_id: a, direction: Direction::Right }, t1)
        .unwrap();
    assert_eq!(v, joined + 1);
    assert_eq!(state.participant(&a).unwrap().position.cell(), (1, 0));

    let too_soon = state.apply_at(
        Action::Move { user_id: a, direction: Direction::Right },
        t1 + Duration::from_millis(10),
    );
    assert_eq!(too_soon, Err(RoomError::TooSoon(a)));
    assert_eq!(state.participant(&a).unwrap().position.cell(), (1, 0));
    assert_eq!(state.version(), joined + 1);

    let rotated = state
        .apply_at(
            Action::Move { user_id: a, direction: Direction::Down },
            t1 + Duration::from_millis(20),
        )
        .unwrap();
    assert_eq!(rotated, joined + 1);
    let p = state.participant(&a).unwrap();
    assert_eq!(p.position.cell(), (1, 0));
    assert_eq!(p.direction, Direction::Down);
}

#[test]
fn accepted_moves_sum_to_displacement() {
    let mut state = RoomState::new(
        Uuid::new_v4(),
        RoomMap::open(10, 10).with_spawn((5, 5)),
    );
    let user = Uuid::new_v4();
    state.apply(Action::Join { user_id: user }).unwrap();
    let start_version = state.version();

    let path = [
        Direction::Down,
        Direction::Down,
        Direction::Right,
        Direction::Right,
        Direction::Right,
        Direction::Up,
        Direction::Left,
    ];

    let mut clock = Instant::now();
    let mut accepted = 0u64;
    let (mut ex, mut ey) = (5, 5);
    for direction in path {
        // rotate when needed; rotations never count
        let facing = state.participant(&user).unwrap().direction;
        if facing != direction {
            let v = state
                .apply_at(Action::Move { user_id: user, direction }, clock)
                .unwrap();
            assert_eq!(v, start_version + accepted);
        }
        clock += MOVE_DELAY;
        state
            .apply_at(Action::Move { user_id: user, direction }, clock)
            .unwrap();
        accepted += 1;
        let (dx, dy) = direction.delta();
        ex += dx;
        ey += dy;
    }

    assert_eq!(state.participant(&user).unwrap().position.cell(), (ex, ey));
    assert_eq!(state.version(), start_version + accepted);
}

#[test]
fn no_active_participant_ever_sits_on_a_blocked_or_outside_cell() {
    let map = RoomMap::open(4, 4).with_blocked([(1, 0), (1, 1), (2, 2), (3, 0)]);
    let mut state = RoomState::new(Uuid::new_v4(), map.clone());
    let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        state.apply(Action::Join { user_id: *user }).unwrap();
    }

    let mut clock = Instant::now();
    let directions = [Direction::Right, Direction::Down, Direction::Left, Direction::Up];
    for round in 0..40 {
        clock += MOVE_DELAY;
        let user = users[round % users.len()];
        let direction = directions[(round / 3) % directions.len()];
        // errors are fine; only the invariant matters
        let _ = state.apply_at(Action::Move { user_id: user, direction }, clock);

        let snapshot = state.serialize();
        let mut cells = std::collections::HashSet::new();
        for p in &snapshot.participants {
            let cell = p.position.cell();
            assert!(map.in_bounds(cell), "{:?} out of bounds", cell);
            assert!(!map.is_blocked(cell), "{:?} is blocked", cell);
            assert!(cells.insert(cell), "{:?} shared", cell);
        }
    }
}

#[test]
fn snapshot_lists_exactly_the_active_participants() {
    let mut state = RoomState::new(Uuid::new_v4(), RoomMap::open(6, 6));
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    for user in [a, b, c] {
        state.apply(Action::Join { user_id: user }).unwrap();
    }
    state.apply(Action::Exit { user_id: b }).unwrap();

    let snapshot = state.serialize();
    assert_eq!(snapshot.version, 4);
    let mut ids: Vec<Uuid> = snapshot.participants.iter().map(|p| p.user_id).collect();
    ids.sort();
    let mut expected = vec![a, c];
    expected.sort();
    assert_eq!(ids, expected);
    for view in &snapshot.participants {
        let p = state.participant(&view.user_id).unwrap();
        assert_eq!(view.position, p.position);
        assert_eq!(view.direction, p.direction);
    }
}

#[test]
fn init_result_carries_snapshot_and_map() {
    let map = RoomMap::open(3, 2).with_blocked([(2, 1)]);
    let mut state = RoomState::new(Uuid::new_v4(), map);
    let user = Uuid::new_v4();
    state.apply(Action::Join { user_id: user }).unwrap();

    let request: ActionRequest =
        serde_json::from_value(json!({ "userID": user, "type": "init" })).unwrap();
    let action = Action::parse(&request).unwrap();
    let version = state.apply(action).unwrap();
    let result = action.format(&state, version);

    assert!(result.only_owner);
    assert_eq!(result.kind, ActionType::Init);
    assert_eq!(result.id, 1);
    let init: InitValue = serde_json::from_value(result.value).unwrap();
    assert_eq!(init.version, 1);
    assert_eq!(init.participants.len(), 1);
    assert_eq!(init.map.width, 3);
    assert_eq!(init.map.blocked.len(), 1);
}

#[test]
fn move_result_reports_position_and_direction() {
    let mut state = RoomState::new(Uuid::new_v4(), RoomMap::open(3, 3));
    let user = Uuid::new_v4();
    state.apply(Action::Join { user_id: user }).unwrap();
    let action = Action::Move { user_id: user, direction: Direction::Right };
    let version = state.apply(action).unwrap();

    let result = action.format(&state, version);
    assert!(!result.only_owner);
    assert_eq!(result.id, 2);
    assert_eq!(
        result.value,
        json!({
            "position": { "x": 32, "y": 0 },
            "cell": { "x": 1, "y": 0 },
            "direction": "right",
        })
    );
}
