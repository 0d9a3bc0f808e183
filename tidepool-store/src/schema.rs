diesel::table! {
    trades (trade_id) {
        trade_id -> Binary,
        status -> Integer,
        offer_bytes -> Binary,
        created_at -> BigInt,
        accepted_at -> Nullable<BigInt>,
        confirmed_at_height -> Integer,
        is_my_offer -> Bool,
        coins_of_interest -> Binary,
        sent_to -> Text,
        updated_at -> Text,
    }
}
